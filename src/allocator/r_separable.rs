
use ::rand::rngs::StdRng;

use crate::allocator::{Allocator, Request, GrantedRequests, AllocatorBuilderArgument};
use crate::arbiter::{Arbiter, ArbiterBuilderArgument, new_arbiter};
use crate::config::ConfigurationValue;
use crate::matrix::Matrix;
use crate::match_object_panic;

/**
One arbiter per resource and nothing more: each resource independently picks one of its
requesting clients, so a client may be granted several resources in one pass. Only usable
where multiple grants per client are acceptable; the schedulers that cannot cope with that
reject this allocator at construction.
```ignore
RSeparable{
	resource_arbiter: Lslp{},
	slip_latch: true,
}
```
**/
pub struct RSeparableAllocator {
    /// The max number of inputs of the router crossbar
    num_clients: usize,
    /// The max number of outputs of the router crossbar
    num_resources: usize,
    /// Advance an arbiter's priority only when it granted something.
    slip_latch: bool,
    resource_arbiters: Vec<Box<dyn Arbiter>>,
    /// The request grid, rows are clients and columns are resources.
    requests: Matrix<bool>,
    metadata: Matrix<u64>,
    metadata_present: Matrix<bool>,
    //column scratch buffers handed to the resource arbiters.
    column_requests: Vec<bool>,
    column_metadata: Vec<u64>,
}

impl RSeparableAllocator {
    pub fn new(args: AllocatorBuilderArgument) -> RSeparableAllocator {
        if args.num_clients == 0 || args.num_resources == 0 {
            panic!("Invalid arguments for RSeparableAllocator");
        }
        let mut slip_latch = None;
        let mut resource_arbiter_cv = None;
        match_object_panic!(args.cv, "RSeparable", value,
            "slip_latch" => slip_latch = Some(value.as_bool().expect("bad value for slip_latch")),
            "resource_arbiter" => resource_arbiter_cv = Some(value.clone()),
        );
        let slip_latch = slip_latch.expect("There were no slip_latch");
        let resource_arbiter_cv = resource_arbiter_cv.expect("There were no resource_arbiter");
        let AllocatorBuilderArgument { num_clients, num_resources, plugs, rng, .. } = args;
        let resource_arbiters = (0..num_resources).map(|_| {
            new_arbiter(ArbiterBuilderArgument { cv: &resource_arbiter_cv, size: num_clients, plugs, rng: &mut *rng })
        }).collect();
        RSeparableAllocator {
            num_clients,
            num_resources,
            slip_latch,
            resource_arbiters,
            requests: Matrix::constant(false, num_clients, num_resources),
            metadata: Matrix::constant(0u64, num_clients, num_resources),
            metadata_present: Matrix::constant(false, num_clients, num_resources),
            column_requests: Vec::with_capacity(num_clients),
            column_metadata: Vec::with_capacity(num_clients),
        }
    }
}

impl Allocator for RSeparableAllocator {
    fn add_request(&mut self, request: Request) {
        if request.client >= self.num_clients || request.resource >= self.num_resources {
            panic!("Invalid request: client {} of {}, resource {} of {}", request.client, self.num_clients, request.resource, self.num_resources);
        }
        *self.requests.get_mut(request.client, request.resource) = true;
        *self.metadata.get_mut(request.client, request.resource) = request.metadata.unwrap_or(0);
        *self.metadata_present.get_mut(request.client, request.resource) = request.metadata.is_some();
    }
    fn perform_allocation(&mut self, rng: &mut StdRng) -> GrantedRequests {
        let mut gr = GrantedRequests::default();
        for resource in 0..self.num_resources {
            self.requests.copy_column_into(resource, &mut self.column_requests);
            self.metadata.copy_column_into(resource, &mut self.column_metadata);
            let winner = self.resource_arbiters[resource].arbitrate(&self.column_requests, Some(&self.column_metadata), rng);
            if let Some(client) = winner {
                let metadata = if *self.metadata_present.get(client, resource) {
                    Some(*self.metadata.get(client, resource))
                } else {
                    None
                };
                gr.add_granted_request(Request { client, resource, metadata });
            }
            if !self.slip_latch || winner.is_some() {
                self.resource_arbiters[resource].latch();
            }
        }
        self.requests.fill(false);
        gr
    }
    fn num_clients(&self) -> usize {
        self.num_clients
    }
    fn num_resources(&self) -> usize {
        self.num_resources
    }
    fn one_grant_per_client(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Plugs;
    use ::rand::SeedableRng;

    fn build(num_clients: usize, num_resources: usize, rng: &mut StdRng) -> RSeparableAllocator {
        let plugs = Plugs::default();
        let cv = ConfigurationValue::Object("RSeparable".to_string(), vec![
            ("slip_latch".to_string(), ConfigurationValue::True),
            ("resource_arbiter".to_string(), ConfigurationValue::Object("Lslp".to_string(), vec![])),
        ]);
        RSeparableAllocator::new(AllocatorBuilderArgument { cv: &cv, num_clients, num_resources, plugs: &plugs, rng })
    }

    #[test]
    fn client_may_win_several_resources() {
        let mut rng = StdRng::seed_from_u64(70u64);
        let mut allocator = build(2, 3, &mut rng);
        //client 0 asks for everything and nobody competes
        for resource in 0..3 {
            allocator.add_request(Request::new(0, resource, None));
        }
        let granted: Vec<Request> = allocator.perform_allocation(&mut rng).into_iter().collect();
        assert_eq!(granted.len(), 3);
        assert!(granted.iter().all(|g| g.client == 0));
    }

    #[test]
    fn one_grant_per_resource() {
        let mut rng = StdRng::seed_from_u64(71u64);
        let mut allocator = build(4, 2, &mut rng);
        for client in 0..4 {
            for resource in 0..2 {
                allocator.add_request(Request::new(client, resource, None));
            }
        }
        let granted: Vec<Request> = allocator.perform_allocation(&mut rng).into_iter().collect();
        assert_eq!(granted.len(), 2);
        let mut per_resource = vec![0usize; 2];
        for g in granted.iter() {
            per_resource[g.resource] += 1;
        }
        assert_eq!(per_resource, vec![1, 1]);
    }

    #[test]
    fn requests_cleared_between_allocations() {
        let mut rng = StdRng::seed_from_u64(72u64);
        let mut allocator = build(2, 2, &mut rng);
        allocator.add_request(Request::new(1, 1, None));
        assert_eq!(allocator.perform_allocation(&mut rng).len(), 1);
        //nothing requested now
        assert!(allocator.perform_allocation(&mut rng).is_empty());
    }
}
