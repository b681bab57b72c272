//! Xform module - per-item mapping
//!
//! Applies a caller-supplied mapping function to each input. The function
//! travels through the spec as a shared argument, so one spec can be
//! instantiated on any partition without re-plumbing configuration.

use plumb_protocol::{Arg, Item};

use crate::{Emit, Fitting, FittingError, FittingModule, FittingResult, InitCtx};

/// A mapping from one input item to zero or more output items
///
/// Wrapped in a struct so it can ride inside [`Arg::Shared`] and be
/// downcast back out by the module factory.
///
/// # Example
///
/// ```
/// use plumb_fittings::Mapper;
/// use plumb_protocol::{Arg, Item};
///
/// let double = Mapper::map(|i: &Item| Item::from(i.as_i64().unwrap_or(0) * 2));
/// let arg = Arg::shared(double);
/// # let _ = arg;
/// ```
pub struct Mapper(Box<dyn Fn(&Item) -> Vec<Item> + Send + Sync>);

impl Mapper {
    /// Build a mapper emitting any number of outputs per input
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Item) -> Vec<Item> + Send + Sync + 'static,
    {
        Self(Box::new(f))
    }

    /// Build a one-to-one mapper
    pub fn map<F>(f: F) -> Self
    where
        F: Fn(&Item) -> Item + Send + Sync + 'static,
    {
        Self::new(move |item| vec![f(item)])
    }

    /// Apply the mapping to one item
    #[inline]
    pub fn apply(&self, item: &Item) -> Vec<Item> {
        (self.0)(item)
    }
}

impl std::fmt::Debug for Mapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Mapper(..)")
    }
}

/// A fitting that maps each input through a [`Mapper`]
pub struct XformFitting {
    mapper: std::sync::Arc<Mapper>,
}

impl Fitting for XformFitting {
    fn init(&mut self, _ctx: &InitCtx<'_>) -> FittingResult<()> {
        Ok(())
    }

    fn process(&mut self, item: Item, out: &mut dyn Emit) -> FittingResult<()> {
        for mapped in self.mapper.apply(&item) {
            out.emit(mapped);
        }
        Ok(())
    }

    fn done(&mut self, _out: &mut dyn Emit) -> FittingResult<()> {
        Ok(())
    }
}

/// Factory for [`XformFitting`]
pub struct XformModule;

impl FittingModule for XformModule {
    fn create(&self, arg: &Arg) -> FittingResult<Box<dyn Fitting>> {
        let mapper = arg
            .downcast::<Mapper>()
            .ok_or_else(|| FittingError::bad_arg("xform expects a shared Mapper argument"))?;
        Ok(Box::new(XformFitting { mapper }))
    }

    fn name(&self) -> &'static str {
        "xform"
    }

    fn validate_arg(&self, arg: &Arg) -> Result<(), String> {
        if arg.downcast::<Mapper>().is_some() {
            Ok(())
        } else {
            Err("expected a shared Mapper argument".to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plumb_protocol::{PartitionId, PipelineOptions};

    #[derive(Default)]
    struct Collected(Vec<Item>);

    impl Emit for Collected {
        fn emit(&mut self, item: Item) {
            self.0.push(item);
        }
    }

    fn init_ctx(options: &PipelineOptions) -> InitCtx<'_> {
        InitCtx {
            stage: "t",
            partition: PartitionId::new(0),
            options,
        }
    }

    #[test]
    fn test_one_to_one_mapping() {
        let arg = Arg::shared(Mapper::map(|i: &Item| Item::from(i.as_i64().unwrap() + 1)));
        let mut fitting = XformModule.create(&arg).unwrap();

        let options = PipelineOptions::default();
        fitting.init(&init_ctx(&options)).unwrap();

        let mut out = Collected::default();
        fitting.process(Item::from(41i64), &mut out).unwrap();
        assert_eq!(out.0, vec![Item::from(42i64)]);
    }

    #[test]
    fn test_fan_out_mapping() {
        let arg = Arg::shared(Mapper::new(|i: &Item| {
            let n = i.as_i64().unwrap();
            vec![Item::from(n), Item::from(-n)]
        }));
        let mut fitting = XformModule.create(&arg).unwrap();

        let mut out = Collected::default();
        fitting.process(Item::from(3i64), &mut out).unwrap();
        assert_eq!(out.0, vec![Item::from(3i64), Item::from(-3i64)]);
    }

    #[test]
    fn test_filtering_mapping() {
        let arg = Arg::shared(Mapper::new(|i: &Item| {
            if i.as_i64().unwrap_or(0) % 2 == 0 {
                vec![i.clone()]
            } else {
                Vec::new()
            }
        }));
        let mut fitting = XformModule.create(&arg).unwrap();

        let mut out = Collected::default();
        for n in 1i64..=4 {
            fitting.process(Item::from(n), &mut out).unwrap();
        }
        assert_eq!(out.0, vec![Item::from(2i64), Item::from(4i64)]);
    }

    #[test]
    fn test_create_rejects_wrong_arg() {
        assert!(XformModule.create(&Arg::None).is_err());
        assert!(XformModule.create(&Arg::value("not a mapper")).is_err());
        assert!(XformModule.validate_arg(&Arg::None).is_err());
    }
}
