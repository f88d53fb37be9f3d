/*!

An Allocator defines the interface for an allocation strategy for a router crossbar: it
matches requesting clients (crossbar inputs) to resources (crossbar outputs) in one cycle.

see [`new_allocator`](fn.new_allocator.html) for documentation on the configuration syntax of predefined allocators.

*/

pub mod r_separable;
pub mod rc_separable;
pub mod cr_separable;
pub mod wavefront;

use crate::Plugs;
use crate::config::ConfigurationValue;

use ::rand::rngs::StdRng;
use r_separable::RSeparableAllocator;
use rc_separable::RcSeparableAllocator;
use cr_separable::CrSeparableAllocator;
use wavefront::WavefrontAllocator;

/// A client (input of crossbar) wants a resource (output of crossbar), optionally carrying
/// a metadata value for the arbiters that compare it.
#[derive(Clone)]
pub struct Request {
    /// The input of the crossbar
    pub client: usize,
    /// The output of the crossbar
    pub resource: usize,
    /// The metadata of the request (None if not specified).
    /// Metadata-comparing arbiters read it; the other policies ignore it.
    pub metadata: Option<u64>,
}

impl Request {
    pub fn new(client: usize, resource: usize, metadata: Option<u64>) -> Request { Self { client, resource, metadata } }
}

/// A collection of granted requests
#[derive(Default)]
pub struct GrantedRequests {
    /// The granted requests
    granted_requests: Vec<Request>,
}

impl GrantedRequests {
    /// Add a granted request to the collection
    fn add_granted_request(&mut self, request: Request) {
        self.granted_requests.push(request);
    }
    pub fn len(&self) -> usize {
        self.granted_requests.len()
    }
    pub fn is_empty(&self) -> bool {
        self.granted_requests.is_empty()
    }
    pub fn iter(&self) -> std::slice::Iter<Request> {
        self.granted_requests.iter()
    }
}

impl IntoIterator for GrantedRequests {
    type Item = Request;
    type IntoIter = <Vec<Request> as IntoIterator>::IntoIter;
    fn into_iter(self) -> <Self as IntoIterator>::IntoIter {
        self.granted_requests.into_iter()
    }
}

/**
An Allocator manages the requests from a set of clients to a set of resources. Requests are
added via `add_request`. When all requests have been made a call to `perform_allocation`
returns a valid, possibly partial, allocation; its state is then cleared, removing all
requests. A granted (client, resource) pair always corresponds to an added request.

unrelated to `std::alloc::Allocator`.
**/
pub trait Allocator {
    /// Add a new request to the allocator.
    /// (It assumes that the request is not already in the allocator)
    fn add_request(&mut self, request: Request);

    /// Returns the granted requests and clears the allocator's requests.
    fn perform_allocation(&mut self, rng: &mut StdRng) -> GrantedRequests;

    /// The number of clients (inputs) of the allocator.
    fn num_clients(&self) -> usize;

    /// The number of resources (outputs) of the allocator.
    fn num_resources(&self) -> usize;

    /// Whether every client is guaranteed at most one granted resource per allocation.
    /// The resource-separable allocator does not provide it; schedulers that cannot cope
    /// with several grants per client must check this at construction.
    fn one_grant_per_client(&self) -> bool;
}

/// Arguments for the allocator builder
#[non_exhaustive]
pub struct AllocatorBuilderArgument<'a>
{
    /// A ConfigurationValue::Object defining the allocator
    pub cv : &'a ConfigurationValue,
    /// The number of outputs of the router crossbar
    pub num_resources : usize,
    /// The number of inputs of the router crossbar
    pub num_clients : usize,

    /// A reference to the Plugs object
    pub plugs : &'a Plugs,
    /// The random number generator to use
    pub rng : &'a mut StdRng,
}

/**
The `RSeparable` allocator runs one arbiter per resource and nothing more: each resource
picks one client, so a client may win several resources in one pass. Only usable where
that is acceptable.
```ignore
RSeparable{
	resource_arbiter: Lslp{},
	slip_latch: true,
}
```

The `RcSeparable` allocator runs the resource arbiters and then a bank of client arbiters to
keep at most one grant per client, iterating `iterations` times over the leftovers. With
`slip_latch` only the arbiters whose grant was accepted advance their priority, which makes
it the classical iSLIP.
```ignore
RcSeparable{
	iterations: 2,
	slip_latch: true,
	resource_arbiter: Lslp{},
	client_arbiter: Lslp{},
}
```

The `CrSeparable` allocator is the symmetric mirror of `RcSeparable`: clients pick a
resource first and the resource arbiters resolve the conflicts.
```ignore
CrSeparable{
	iterations: 1,
	slip_latch: false,
	resource_arbiter: Lslp{},
	client_arbiter: Lslp{},
}
```

The `Wavefront` allocator folds the clients×resources grid into rows×cols and sweeps
diagonal lines from a starting line, granting every requested cell whose row and column are
still free. The starting line advances sequentially or is redrawn at random.
```ignore
Wavefront{
	scheme: "random",
}
```
**/
pub fn new_allocator(arg:AllocatorBuilderArgument) -> Box<dyn Allocator>
{
    if let &ConfigurationValue::Object(ref cv_name, ref _cv_pairs)=arg.cv
    {
        if let Some(builder) = arg.plugs.allocators.get(cv_name) {
            return builder(arg)
        };
        match cv_name.as_ref()
        {
            "RSeparable" => Box::new(RSeparableAllocator::new(arg)),
            "RcSeparable" => Box::new(RcSeparableAllocator::new(arg)),
            "Islip" | "iSLIP" =>
            {
                let mut cv = arg.cv.clone();
                cv.rename("RcSeparable".into());
                let alias = AllocatorBuilderArgument{cv:&cv,..arg};
                Box::new(RcSeparableAllocator::new(alias))
            }
            "CrSeparable" => Box::new(CrSeparableAllocator::new(arg)),
            "Wavefront" => Box::new(WavefrontAllocator::new(arg)),
            _ => panic!("Unknown allocator: {}", cv_name),
        }
    }
    else
    {
        panic!("Trying to create an Allocator from a non-Object");
    }
}
