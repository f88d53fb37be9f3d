
use ::rand::{Rng,rngs::StdRng};

use crate::arbiter::{Arbiter, ArbiterBuilderArgument, check_shapes};
use crate::config::ConfigurationValue;
use crate::match_object_panic;

/**
Draws a random rotation offset on each call and picks the lowest-index asserted requestor
under that rotation. Unlike `Random` the chance of winning depends on the position relative
to the other requestors, which mimics a round-robin whose pointer is redrawn every cycle.
Stateless.
```ignore
RandomPriority{}
```
**/
pub struct RandomPriorityArbiter {
    size: usize,
}

impl RandomPriorityArbiter {
    pub fn new(args: ArbiterBuilderArgument) -> RandomPriorityArbiter {
        if args.size == 0 {
            panic!("cannot build an arbiter of size 0");
        }
        match_object_panic!(args.cv, "RandomPriority", _value);
        RandomPriorityArbiter {
            size: args.size,
        }
    }
}

impl Arbiter for RandomPriorityArbiter {
    fn size(&self) -> usize {
        self.size
    }
    fn arbitrate(&mut self, requests: &[bool], metadata: Option<&[u64]>, rng: &mut StdRng) -> Option<usize> {
        check_shapes(self.size, requests, metadata);
        let offset = rng.gen_range(0..self.size);
        for index in 0..self.size {
            let client = (index + offset) % self.size;
            if requests[client] {
                return Some(client);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Plugs;
    use ::rand::SeedableRng;

    #[test]
    fn rotation_covers_everyone() {
        let mut rng = StdRng::seed_from_u64(40u64);
        let plugs = Plugs::default();
        let cv = ConfigurationValue::Object("RandomPriority".to_string(), vec![]);
        let mut arbiter = RandomPriorityArbiter::new(ArbiterBuilderArgument { cv: &cv, size: 4, plugs: &plugs, rng: &mut rng });
        let requests = vec![true; 4];
        let mut wins = vec![0usize; 4];
        for _ in 0..4000 {
            let winner = arbiter.arbitrate(&requests, None, &mut rng).expect("no winner");
            wins[winner] += 1;
        }
        for &count in wins.iter() {
            assert!(count > 0, "every requestor must eventually win under rotation");
        }
    }

    #[test]
    fn single_requestor_always_wins() {
        let mut rng = StdRng::seed_from_u64(41u64);
        let plugs = Plugs::default();
        let cv = ConfigurationValue::Object("RandomPriority".to_string(), vec![]);
        let mut arbiter = RandomPriorityArbiter::new(ArbiterBuilderArgument { cv: &cv, size: 5, plugs: &plugs, rng: &mut rng });
        let requests = vec![false, false, true, false, false];
        for _ in 0..100 {
            assert_eq!(arbiter.arbitrate(&requests, None, &mut rng), Some(2));
        }
    }
}
