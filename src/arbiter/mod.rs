/*!

An Arbiter picks at most one winner among a set of requestors. They are the building block
of the allocators: an allocator instantiates a bank of arbiters and feeds them rows or
columns of its request grid.

see [`new_arbiter`](fn.new_arbiter.html) for documentation on the configuration syntax of predefined arbiters.

*/

pub mod lslp;
pub mod comparing;
pub mod random;
pub mod random_priority;
pub mod lru;
pub mod dual_stage;

use crate::Plugs;
use crate::config::ConfigurationValue;

use ::rand::rngs::StdRng;
use lslp::LslpArbiter;
use comparing::ComparingArbiter;
use random::RandomArbiter;
use random_priority::RandomPriorityArbiter;
use lru::LruArbiter;
use dual_stage::DualStageClassArbiter;

/**
An Arbiter selects a winner among the asserted entries of a request vector. The caller owns
the request and metadata storage and passes borrowed views; the arbiter only reports the
winner, so a grant can never appear for a port that was not requested.

Stateful arbiters (round-robin, LRU) separate the decision from the priority update: the
priority state advanced by a call to `arbitrate` only takes effect once `latch` is called.
The caller decides whether a given arbitration counts toward priority advancement, which is
what the iSLIP allocator exploits.
**/
pub trait Arbiter {
    /// Number of requestors this arbiter decides among.
    fn size(&self) -> usize;

    /// Pick a winner among the asserted `requests`, or None if no request is asserted.
    /// `metadata` must be provided for the policies comparing it and may be omitted otherwise.
    /// Both slices must be of length `size()`.
    fn arbitrate(&mut self, requests: &[bool], metadata: Option<&[u64]>, rng: &mut StdRng) -> Option<usize>;

    /// Commit the priority state changed by the last `arbitrate` call.
    /// Stateless arbiters do nothing.
    fn latch(&mut self) {}
}

/// Arguments for the arbiter builder
#[non_exhaustive]
pub struct ArbiterBuilderArgument<'a>
{
    /// A ConfigurationValue::Object defining the arbiter
    pub cv : &'a ConfigurationValue,
    /// The number of requestors of the arbiter
    pub size : usize,

    /// A reference to the Plugs object
    pub plugs : &'a Plugs,
    /// The random number generator to use
    pub rng : &'a mut StdRng,
}

/**
The arbiter `Lslp` (last served, lowest priority) is the classical round-robin: the winner is
the first asserted requestor at or after the priority pointer, and latching moves the pointer
just past the winner. The initial pointer is randomized.
```ignore
Lslp{}
```

The `Comparing` arbiter picks the requestor with greatest (or least) metadata, breaking ties
uniformly at random. Stateless.
```ignore
Comparing{
	greater: true,
}
```

The `Random` arbiter picks uniformly among the asserted requestors. Stateless.
```ignore
Random{}
```

The `RandomPriority` arbiter draws a random rotation offset each call and picks the first
asserted requestor under that rotation. Stateless.
```ignore
RandomPriority{}
```

The `Lru` arbiter keeps an ordered priority list, initialized to a random permutation; the
winner is the asserted requestor closest to the head and latching moves the last winner to
the tail.
```ignore
Lru{}
```

The `DualStageClass` arbiter groups the requestors into classes. A first stage arbitrates
among the classes, over metadata aggregated per class with `metadata_func`; a second stage
arbitrates among the requestors of the winning class. Both stages are themselves arbiters.
```ignore
DualStageClass{
	classes: 2,
	class_map: [0, 1],
	metadata_func: "min",
	stage1_arbiter: Comparing{ greater: false },
	stage2_arbiter: Lslp{},
}
```
**/
pub fn new_arbiter(arg:ArbiterBuilderArgument) -> Box<dyn Arbiter>
{
    if let &ConfigurationValue::Object(ref cv_name, ref _cv_pairs)=arg.cv
    {
        if let Some(builder) = arg.plugs.arbiters.get(cv_name) {
            return builder(arg)
        };
        match cv_name.as_ref()
        {
            "Lslp" => Box::new(LslpArbiter::new(arg)),
            "RoundRobin" =>
            {
                let mut cv = arg.cv.clone();
                cv.rename("Lslp".into());
                let alias = ArbiterBuilderArgument{cv:&cv,..arg};
                Box::new(LslpArbiter::new(alias))
            },
            "Comparing" => Box::new(ComparingArbiter::new(arg)),
            "Random" => Box::new(RandomArbiter::new(arg)),
            "RandomPriority" => Box::new(RandomPriorityArbiter::new(arg)),
            "Lru" => Box::new(LruArbiter::new(arg)),
            "DualStageClass" => Box::new(DualStageClassArbiter::new(arg)),
            _ => panic!("Unknown arbiter: {}", cv_name),
        }
    }
    else
    {
        panic!("Trying to create an Arbiter from a non-Object");
    }
}

/// Panics unless the vector shapes match what `Arbiter::arbitrate` expects.
/// Kept here so every variant validates the same way.
pub(crate) fn check_shapes(size:usize, requests:&[bool], metadata:Option<&[u64]>)
{
    if requests.len() != size {
        panic!("arbitrating over {} requests in an arbiter of size {}", requests.len(), size);
    }
    if let Some(meta) = metadata {
        if meta.len() != size {
            panic!("arbitrating over {} metadata entries in an arbiter of size {}", meta.len(), size);
        }
    }
}
