
use ::rand::{Rng,rngs::StdRng};

use crate::arbiter::{Arbiter, ArbiterBuilderArgument, check_shapes};
use crate::config::ConfigurationValue;
use crate::match_object_panic;

/**
Picks uniformly at random among the asserted requestors. Stateless.
```ignore
Random{}
```
**/
pub struct RandomArbiter {
    size: usize,
    /// Asserted requestors of the current call, reused across calls.
    candidates: Vec<usize>,
}

impl RandomArbiter {
    pub fn new(args: ArbiterBuilderArgument) -> RandomArbiter {
        if args.size == 0 {
            panic!("cannot build an arbiter of size 0");
        }
        match_object_panic!(args.cv, "Random", _value);
        RandomArbiter {
            size: args.size,
            candidates: Vec::with_capacity(args.size),
        }
    }
}

impl Arbiter for RandomArbiter {
    fn size(&self) -> usize {
        self.size
    }
    fn arbitrate(&mut self, requests: &[bool], metadata: Option<&[u64]>, rng: &mut StdRng) -> Option<usize> {
        check_shapes(self.size, requests, metadata);
        for client in 0..self.size {
            if requests[client] {
                self.candidates.push(client);
            }
        }
        let winner = if self.candidates.is_empty() {
            None
        } else {
            Some(self.candidates[rng.gen_range(0..self.candidates.len())])
        };
        self.candidates.clear();
        winner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Plugs;
    use ::rand::SeedableRng;

    #[test]
    fn only_requestors_win() {
        let mut rng = StdRng::seed_from_u64(30u64);
        let plugs = Plugs::default();
        let cv = ConfigurationValue::Object("Random".to_string(), vec![]);
        let mut arbiter = RandomArbiter::new(ArbiterBuilderArgument { cv: &cv, size: 6, plugs: &plugs, rng: &mut rng });
        let requests = vec![false, true, false, true, true, false];
        let mut seen = vec![false; 6];
        for _ in 0..1000 {
            let winner = arbiter.arbitrate(&requests, None, &mut rng).expect("no winner");
            assert!(requests[winner]);
            seen[winner] = true;
        }
        assert_eq!(seen, vec![false, true, false, true, true, false]);
    }
}
