
use ::rand::{Rng,rngs::StdRng};

use crate::arbiter::{Arbiter, ArbiterBuilderArgument, check_shapes};
use crate::config::ConfigurationValue;
use crate::match_object_panic;

/**
Last served, lowest priority. The winner is the lowest index at or after the priority
pointer whose request is asserted, wrapping around. Latching moves the pointer just past
the last winner, so under a stable request vector the grants rotate fairly.
```ignore
Lslp{}
```
**/
pub struct LslpArbiter {
    size: usize,
    /// The committed priority pointer, used by `arbitrate`.
    priority: usize,
    /// The pointer value the next `latch` will commit.
    next_priority: usize,
}

impl LslpArbiter {
    pub fn new(args: ArbiterBuilderArgument) -> LslpArbiter {
        if args.size == 0 {
            panic!("cannot build an arbiter of size 0");
        }
        match_object_panic!(args.cv, "Lslp", _value);
        let next_priority = args.rng.gen_range(0..args.size);
        let mut arbiter = LslpArbiter {
            size: args.size,
            priority: 0,
            next_priority,
        };
        arbiter.latch();
        arbiter
    }
}

impl Arbiter for LslpArbiter {
    fn size(&self) -> usize {
        self.size
    }
    fn arbitrate(&mut self, requests: &[bool], metadata: Option<&[u64]>, _rng: &mut StdRng) -> Option<usize> {
        check_shapes(self.size, requests, metadata);
        for offset in 0..self.size {
            let client = (self.priority + offset) % self.size;
            if requests[client] {
                self.next_priority = (client + 1) % self.size;
                return Some(client);
            }
        }
        None
    }
    fn latch(&mut self) {
        self.priority = self.next_priority;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Plugs;
    use ::rand::SeedableRng;

    fn build(size: usize, rng: &mut StdRng) -> LslpArbiter {
        let plugs = Plugs::default();
        let cv = ConfigurationValue::Object("Lslp".to_string(), vec![]);
        LslpArbiter::new(ArbiterBuilderArgument { cv: &cv, size, plugs: &plugs, rng })
    }

    #[test]
    fn round_robin_sequence() {
        //With everyone requesting and latching every cycle the winners just rotate.
        let mut rng = StdRng::seed_from_u64(10u64);
        let mut arbiter = build(4, &mut rng);
        let requests = vec![true; 4];
        let first = arbiter.arbitrate(&requests, None, &mut rng).expect("no winner");
        let mut counts = vec![0usize; 4];
        arbiter.latch();
        counts[first] += 1;
        let mut expected = (first + 1) % 4;
        for _ in 1..12 {
            let winner = arbiter.arbitrate(&requests, None, &mut rng).expect("no winner");
            assert_eq!(winner, expected, "round robin must advance by one");
            counts[winner] += 1;
            arbiter.latch();
            expected = (winner + 1) % 4;
        }
        assert_eq!(counts, vec![3, 3, 3, 3]);
    }

    #[test]
    fn skips_idle_requestors() {
        let mut rng = StdRng::seed_from_u64(11u64);
        let mut arbiter = build(4, &mut rng);
        let requests = vec![false, true, false, true];
        for _ in 0..8 {
            let winner = arbiter.arbitrate(&requests, None, &mut rng).expect("no winner");
            assert!(requests[winner], "granted an idle requestor");
            arbiter.latch();
        }
    }

    #[test]
    fn no_requests_no_winner() {
        let mut rng = StdRng::seed_from_u64(12u64);
        let mut arbiter = build(3, &mut rng);
        assert_eq!(arbiter.arbitrate(&[false, false, false], None, &mut rng), None);
    }

    #[test]
    fn without_latch_priority_is_stable() {
        let mut rng = StdRng::seed_from_u64(13u64);
        let mut arbiter = build(4, &mut rng);
        let requests = vec![true; 4];
        let first = arbiter.arbitrate(&requests, None, &mut rng).expect("no winner");
        //The pointer only moves on latch, so the same winner repeats.
        let second = arbiter.arbitrate(&requests, None, &mut rng).expect("no winner");
        assert_eq!(first, second);
    }
}
