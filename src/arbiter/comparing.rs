
use ::rand::{Rng,rngs::StdRng};

use crate::arbiter::{Arbiter, ArbiterBuilderArgument, check_shapes};
use crate::config::ConfigurationValue;
use crate::match_object_panic;

/**
Picks the requestor with the greatest (or least, with `greater:false`) metadata among the
asserted ones. Ties are broken uniformly at random. Stateless.
```ignore
Comparing{
	greater: true,
}
```
**/
pub struct ComparingArbiter {
    size: usize,
    greater: bool,
    /// Requestors currently holding the best metadata, reused across calls.
    best_set: Vec<usize>,
}

impl ComparingArbiter {
    pub fn new(args: ArbiterBuilderArgument) -> ComparingArbiter {
        if args.size == 0 {
            panic!("cannot build an arbiter of size 0");
        }
        let mut greater = None;
        match_object_panic!(args.cv, "Comparing", value,
            "greater" => greater = Some(value.as_bool().expect("bad value for greater")),
        );
        let greater = greater.expect("There were no greater");
        ComparingArbiter {
            size: args.size,
            greater,
            best_set: Vec::with_capacity(args.size),
        }
    }
}

impl Arbiter for ComparingArbiter {
    fn size(&self) -> usize {
        self.size
    }
    fn arbitrate(&mut self, requests: &[bool], metadata: Option<&[u64]>, rng: &mut StdRng) -> Option<usize> {
        check_shapes(self.size, requests, metadata);
        let metadata = metadata.expect("a Comparing arbiter requires metadata");
        let mut best: Option<u64> = None;
        for client in 0..self.size {
            if !requests[client] {
                continue;
            }
            let value = metadata[client];
            match best {
                None => {
                    best = Some(value);
                    self.best_set.push(client);
                }
                Some(current) => {
                    if (self.greater && value > current) || (!self.greater && value < current) {
                        best = Some(value);
                        self.best_set.clear();
                        self.best_set.push(client);
                    } else if value == current {
                        self.best_set.push(client);
                    }
                }
            }
        }
        let winner = if self.best_set.is_empty() {
            None
        } else {
            Some(self.best_set[rng.gen_range(0..self.best_set.len())])
        };
        self.best_set.clear();
        winner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Plugs;
    use ::rand::SeedableRng;

    fn build(size: usize, greater: bool, rng: &mut StdRng) -> ComparingArbiter {
        let plugs = Plugs::default();
        let cv = ConfigurationValue::Object("Comparing".to_string(), vec![
            ("greater".to_string(), if greater { ConfigurationValue::True } else { ConfigurationValue::False }),
        ]);
        ComparingArbiter::new(ArbiterBuilderArgument { cv: &cv, size, plugs: &plugs, rng })
    }

    #[test]
    fn greatest_wins() {
        let mut rng = StdRng::seed_from_u64(20u64);
        let mut arbiter = build(5, true, &mut rng);
        let requests = vec![true, false, true, true, false];
        let metadata = vec![10u64, 0, 30, 20, 0];
        assert_eq!(arbiter.arbitrate(&requests, Some(&metadata), &mut rng), Some(2));
    }

    #[test]
    fn least_wins() {
        let mut rng = StdRng::seed_from_u64(21u64);
        let mut arbiter = build(5, false, &mut rng);
        let requests = vec![true, false, true, true, false];
        let metadata = vec![10u64, 0, 30, 20, 0];
        //index 1 and 4 are not requesting, their 0 metadata cannot win
        assert_eq!(arbiter.arbitrate(&requests, Some(&metadata), &mut rng), Some(0));
    }

    #[test]
    fn ties_split_uniformly() {
        let mut rng = StdRng::seed_from_u64(22u64);
        let mut arbiter = build(5, true, &mut rng);
        let requests = vec![true, false, true, true, false];
        let metadata = vec![10u64, 0, 20, 20, 0];
        let trials = 40_000usize;
        let mut wins = vec![0usize; 5];
        for _ in 0..trials {
            let winner = arbiter.arbitrate(&requests, Some(&metadata), &mut rng).expect("no winner");
            assert!(winner == 2 || winner == 3, "only the tied best may win");
            wins[winner] += 1;
        }
        let fraction = wins[2] as f64 / trials as f64;
        assert!(fraction > 0.49 && fraction < 0.51, "tie-break is biased: {}", fraction);
    }
}
