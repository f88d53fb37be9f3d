
use ::rand::rngs::StdRng;

use crate::arbiter::{Arbiter, ArbiterBuilderArgument, new_arbiter, check_shapes};
use crate::config::ConfigurationValue;
use crate::match_object_panic;

enum MetadataFunc {
    None,
    Min,
    Max,
}

/**
Groups the requestors into classes and arbitrates in two stages: first among the classes,
over metadata aggregated per class, then among the requestors of the winning class. The
class of a requestor is `class_map[requestor % class_map.len()]`, so the map describes one
group of requestors and repeats. Both stages are arbiters built from the configuration.
```ignore
DualStageClass{
	classes: 2,
	class_map: [0, 0, 1, 1],
	metadata_func: "min",
	stage1_arbiter: Comparing{ greater: false },
	stage2_arbiter: Lslp{},
}
```
**/
pub struct DualStageClassArbiter {
    size: usize,
    num_classes: usize,
    /// class of each requestor.
    map: Vec<usize>,
    metadata_func: MetadataFunc,
    stage1_arbiter: Box<dyn Arbiter>,
    stage2_arbiter: Box<dyn Arbiter>,
    //scratch vectors rebuilt each arbitration.
    stage1_requests: Vec<bool>,
    stage1_metadata: Vec<u64>,
    stage2_requests: Vec<bool>,
}

impl DualStageClassArbiter {
    pub fn new(args: ArbiterBuilderArgument) -> DualStageClassArbiter {
        if args.size == 0 {
            panic!("cannot build an arbiter of size 0");
        }
        let mut classes = None;
        let mut class_map: Option<Vec<usize>> = None;
        let mut metadata_func = None;
        let mut stage1_cv = None;
        let mut stage2_cv = None;
        match_object_panic!(args.cv, "DualStageClass", value,
            "classes" => classes = Some(value.as_usize().expect("bad value for classes")),
            "class_map" => class_map = Some(value.as_array().expect("bad value for class_map").iter()
                .map(|v| v.as_usize().expect("bad value in class_map")).collect()),
            "metadata_func" => metadata_func = Some(match value.as_str().expect("bad value for metadata_func") {
                "none" => MetadataFunc::None,
                "min" => MetadataFunc::Min,
                "max" => MetadataFunc::Max,
                func => panic!("invalid metadata function: {}", func),
            }),
            "stage1_arbiter" => stage1_cv = Some(value.clone()),
            "stage2_arbiter" => stage2_cv = Some(value.clone()),
        );
        let num_classes = classes.expect("There were no classes");
        if num_classes == 0 {
            panic!("There must be at least one class");
        }
        let class_map = class_map.expect("There were no class_map");
        let num_groups = class_map.len();
        if num_groups == 0 || args.size % num_groups != 0 {
            panic!("class_map length must divide the arbiter size");
        }
        for &group_class in class_map.iter() {
            if group_class >= num_classes {
                panic!("class {} out of the {} declared classes", group_class, num_classes);
            }
        }
        let metadata_func = metadata_func.expect("There were no metadata_func");
        let map: Vec<usize> = (0..args.size).map(|client| class_map[client % num_groups]).collect();
        let stage1_cv = stage1_cv.expect("There were no stage1_arbiter");
        let stage2_cv = stage2_cv.expect("There were no stage2_arbiter");
        let ArbiterBuilderArgument { plugs, rng, size, .. } = args;
        let stage1_arbiter = new_arbiter(ArbiterBuilderArgument { cv: &stage1_cv, size: num_classes, plugs, rng: &mut *rng });
        let stage2_arbiter = new_arbiter(ArbiterBuilderArgument { cv: &stage2_cv, size, plugs, rng });
        DualStageClassArbiter {
            size,
            num_classes,
            map,
            metadata_func,
            stage1_arbiter,
            stage2_arbiter,
            stage1_requests: vec![false; num_classes],
            stage1_metadata: vec![0u64; num_classes],
            stage2_requests: vec![false; size],
        }
    }
}

impl Arbiter for DualStageClassArbiter {
    fn size(&self) -> usize {
        self.size
    }
    fn arbitrate(&mut self, requests: &[bool], metadata: Option<&[u64]>, rng: &mut StdRng) -> Option<usize> {
        check_shapes(self.size, requests, metadata);
        //aggregate requests and metadata per class for the first stage
        for class in 0..self.num_classes {
            self.stage1_requests[class] = false;
            self.stage1_metadata[class] = 0;
        }
        for client in 0..self.size {
            if !requests[client] {
                continue;
            }
            let class = self.map[client];
            let value = metadata.map(|m| m[client]).unwrap_or(0);
            if self.stage1_requests[class] {
                match self.metadata_func {
                    MetadataFunc::None => (),
                    MetadataFunc::Min => self.stage1_metadata[class] = self.stage1_metadata[class].min(value),
                    MetadataFunc::Max => self.stage1_metadata[class] = self.stage1_metadata[class].max(value),
                }
            } else {
                self.stage1_metadata[class] = value;
                self.stage1_requests[class] = true;
            }
        }
        let winning_class = self.stage1_arbiter.arbitrate(&self.stage1_requests, Some(&self.stage1_metadata), rng)?;
        //only requestors of the winning class may enter the second stage
        for client in 0..self.size {
            self.stage2_requests[client] = requests[client] && self.map[client] == winning_class;
        }
        self.stage2_arbiter.arbitrate(&self.stage2_requests, metadata, rng)
    }
    fn latch(&mut self) {
        self.stage1_arbiter.latch();
        self.stage2_arbiter.latch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Plugs;
    use ::rand::SeedableRng;

    fn build(size: usize, classes: usize, class_map: Vec<usize>, metadata_func: &str, rng: &mut StdRng) -> DualStageClassArbiter {
        let plugs = Plugs::default();
        let cv = ConfigurationValue::Object("DualStageClass".to_string(), vec![
            ("classes".to_string(), ConfigurationValue::Number(classes as f64)),
            ("class_map".to_string(), ConfigurationValue::Array(
                class_map.into_iter().map(|c| ConfigurationValue::Number(c as f64)).collect())),
            ("metadata_func".to_string(), ConfigurationValue::Literal(metadata_func.to_string())),
            ("stage1_arbiter".to_string(), ConfigurationValue::Object("Comparing".to_string(), vec![
                ("greater".to_string(), ConfigurationValue::False),
            ])),
            ("stage2_arbiter".to_string(), ConfigurationValue::Object("Lslp".to_string(), vec![])),
        ]);
        DualStageClassArbiter::new(ArbiterBuilderArgument { cv: &cv, size, plugs: &plugs, rng })
    }

    #[test]
    fn class_with_least_metadata_wins() {
        let mut rng = StdRng::seed_from_u64(60u64);
        //clients 0,2 belong to class 0 and clients 1,3 to class 1
        let mut arbiter = build(4, 2, vec![0, 1], "min", &mut rng);
        let requests = vec![true, true, true, true];
        let metadata = vec![50u64, 5, 40, 9];
        //class 1 aggregates min(5,9)=5 < class 0 min(50,40)=40, so the winner is 1 or 3
        for _ in 0..10 {
            let winner = arbiter.arbitrate(&requests, Some(&metadata), &mut rng).expect("no winner");
            assert!(winner == 1 || winner == 3);
            arbiter.latch();
        }
    }

    #[test]
    fn empty_class_cannot_win() {
        let mut rng = StdRng::seed_from_u64(61u64);
        let mut arbiter = build(4, 2, vec![0, 1], "max", &mut rng);
        let requests = vec![true, false, true, false];
        let metadata = vec![1u64, 100, 2, 100];
        //class 1 has no asserted requestor, so class 0 wins despite lower metadata
        let winner = arbiter.arbitrate(&requests, Some(&metadata), &mut rng).expect("no winner");
        assert!(winner == 0 || winner == 2);
    }

    #[test]
    fn no_requests_no_winner() {
        let mut rng = StdRng::seed_from_u64(62u64);
        let mut arbiter = build(4, 2, vec![0, 1], "none", &mut rng);
        assert_eq!(arbiter.arbitrate(&[false; 4], None, &mut rng), None);
    }
}
