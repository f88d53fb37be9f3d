
use std::collections::VecDeque;

use ::rand::rngs::StdRng;
use ::rand::prelude::SliceRandom;

use crate::arbiter::{Arbiter, ArbiterBuilderArgument, check_shapes};
use crate::config::ConfigurationValue;
use crate::match_object_panic;

/**
Least recently used. An ordered priority list is initialized to a random permutation; the
winner is the asserted requestor closest to the head and latching moves the last winner to
the tail, so frequent winners sink in priority.
```ignore
Lru{}
```
**/
pub struct LruArbiter {
    size: usize,
    /// Requestors ordered from highest to lowest priority.
    priority: VecDeque<usize>,
    /// Winner of the last `arbitrate`, pending a `latch`.
    last_winner: Option<usize>,
}

impl LruArbiter {
    pub fn new(args: ArbiterBuilderArgument) -> LruArbiter {
        if args.size == 0 {
            panic!("cannot build an arbiter of size 0");
        }
        match_object_panic!(args.cv, "Lru", _value);
        let mut clients: Vec<usize> = (0..args.size).collect();
        clients.shuffle(args.rng);
        LruArbiter {
            size: args.size,
            priority: clients.into_iter().collect(),
            last_winner: None,
        }
    }
}

impl Arbiter for LruArbiter {
    fn size(&self) -> usize {
        self.size
    }
    fn arbitrate(&mut self, requests: &[bool], metadata: Option<&[u64]>, _rng: &mut StdRng) -> Option<usize> {
        check_shapes(self.size, requests, metadata);
        for &client in self.priority.iter() {
            if requests[client] {
                self.last_winner = Some(client);
                return Some(client);
            }
        }
        None
    }
    fn latch(&mut self) {
        if let Some(winner) = self.last_winner.take() {
            self.priority.retain(|&client| client != winner);
            self.priority.push_back(winner);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Plugs;
    use ::rand::SeedableRng;

    fn build(size: usize, rng: &mut StdRng) -> LruArbiter {
        let plugs = Plugs::default();
        let cv = ConfigurationValue::Object("Lru".to_string(), vec![]);
        LruArbiter::new(ArbiterBuilderArgument { cv: &cv, size, plugs: &plugs, rng })
    }

    #[test]
    fn winner_drops_to_tail() {
        let mut rng = StdRng::seed_from_u64(50u64);
        let mut arbiter = build(4, &mut rng);
        let requests = vec![true; 4];
        //After winning and latching, a client can win again only after the others.
        let first = arbiter.arbitrate(&requests, None, &mut rng).expect("no winner");
        arbiter.latch();
        for _ in 0..3 {
            let winner = arbiter.arbitrate(&requests, None, &mut rng).expect("no winner");
            assert_ne!(winner, first, "last winner must sink below the others");
            arbiter.latch();
        }
        let again = arbiter.arbitrate(&requests, None, &mut rng).expect("no winner");
        assert_eq!(again, first);
    }

    #[test]
    fn without_latch_order_is_kept() {
        let mut rng = StdRng::seed_from_u64(51u64);
        let mut arbiter = build(4, &mut rng);
        let requests = vec![true; 4];
        let first = arbiter.arbitrate(&requests, None, &mut rng).expect("no winner");
        let second = arbiter.arbitrate(&requests, None, &mut rng).expect("no winner");
        assert_eq!(first, second);
    }

    #[test]
    fn grants_follow_requests() {
        let mut rng = StdRng::seed_from_u64(52u64);
        let mut arbiter = build(6, &mut rng);
        let requests = vec![false, true, false, false, true, false];
        for _ in 0..10 {
            let winner = arbiter.arbitrate(&requests, None, &mut rng).expect("no winner");
            assert!(requests[winner]);
            arbiter.latch();
        }
    }
}
