
use ::rand::rngs::StdRng;

use crate::allocator::{Allocator, Request, GrantedRequests, AllocatorBuilderArgument};
use crate::arbiter::{Arbiter, ArbiterBuilderArgument, new_arbiter};
use crate::config::ConfigurationValue;
use crate::matrix::Matrix;
use crate::match_object_panic;

/**
Client-then-resource separable allocation, the symmetric mirror of `RcSeparable`: every
client arbiter first picks one resource among its row of requests, and the resource
arbiters then resolve the conflicting candidates. Accepting a grant removes the client's
other requests and the other requests on the resource, and the pass repeats `iterations`
times over the leftovers. `slip_latch` has the same meaning as in `RcSeparable`.
```ignore
CrSeparable{
	iterations: 1,
	slip_latch: false,
	resource_arbiter: Lslp{},
	client_arbiter: Lslp{},
}
```
**/
pub struct CrSeparableAllocator {
    /// The max number of inputs of the router crossbar
    num_clients: usize,
    /// The max number of outputs of the router crossbar
    num_resources: usize,
    iterations: usize,
    /// iSLIP selective priority latching
    slip_latch: bool,
    resource_arbiters: Vec<Box<dyn Arbiter>>,
    client_arbiters: Vec<Box<dyn Arbiter>>,
    /// The request grid, rows are clients and columns are resources.
    requests: Matrix<bool>,
    metadata: Matrix<u64>,
    metadata_present: Matrix<bool>,
    /// Winners of the client pass, read by the resource arbiters.
    intermediate: Matrix<bool>,
    //column scratch buffers handed to the resource arbiters.
    column_requests: Vec<bool>,
    column_metadata: Vec<u64>,
}

impl CrSeparableAllocator {
    pub fn new(args: AllocatorBuilderArgument) -> CrSeparableAllocator {
        if args.num_clients == 0 || args.num_resources == 0 {
            panic!("Invalid arguments for CrSeparableAllocator");
        }
        let mut iterations = None;
        let mut slip_latch = None;
        let mut resource_arbiter_cv = None;
        let mut client_arbiter_cv = None;
        match_object_panic!(args.cv, "CrSeparable", value,
            "iterations" => iterations = Some(value.as_usize().expect("bad value for iterations")),
            "slip_latch" => slip_latch = Some(value.as_bool().expect("bad value for slip_latch")),
            "resource_arbiter" => resource_arbiter_cv = Some(value.clone()),
            "client_arbiter" => client_arbiter_cv = Some(value.clone()),
        );
        let iterations = iterations.expect("There were no iterations");
        if iterations == 0 {
            panic!("There must be at least one iteration");
        }
        let slip_latch = slip_latch.expect("There were no slip_latch");
        let resource_arbiter_cv = resource_arbiter_cv.expect("There were no resource_arbiter");
        let client_arbiter_cv = client_arbiter_cv.expect("There were no client_arbiter");
        let AllocatorBuilderArgument { num_clients, num_resources, plugs, rng, .. } = args;
        let resource_arbiters = (0..num_resources).map(|_| {
            new_arbiter(ArbiterBuilderArgument { cv: &resource_arbiter_cv, size: num_clients, plugs, rng: &mut *rng })
        }).collect();
        let client_arbiters = (0..num_clients).map(|_| {
            new_arbiter(ArbiterBuilderArgument { cv: &client_arbiter_cv, size: num_resources, plugs, rng: &mut *rng })
        }).collect();
        CrSeparableAllocator {
            num_clients,
            num_resources,
            iterations,
            slip_latch,
            resource_arbiters,
            client_arbiters,
            requests: Matrix::constant(false, num_clients, num_resources),
            metadata: Matrix::constant(0u64, num_clients, num_resources),
            metadata_present: Matrix::constant(false, num_clients, num_resources),
            intermediate: Matrix::constant(false, num_clients, num_resources),
            column_requests: Vec::with_capacity(num_clients),
            column_metadata: Vec::with_capacity(num_clients),
        }
    }
}

impl Allocator for CrSeparableAllocator {
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
        for _ in 0..self.iterations {
            //client pass over the remaining requests
            self.intermediate.fill(false);
            for client in 0..self.num_clients {
                let winner = self.client_arbiters[client].arbitrate(self.requests.row(client), Some(self.metadata.row(client)), rng);
                if let Some(resource) = winner {
                    *self.intermediate.get_mut(client, resource) = true;
                }
                if !self.slip_latch {
                    self.client_arbiters[client].latch();
                }
            }
            //resource pass resolving conflicting candidates
            for resource in 0..self.num_resources {
                self.intermediate.copy_column_into(resource, &mut self.column_requests);
                self.metadata.copy_column_into(resource, &mut self.column_metadata);
                let winner = self.resource_arbiters[resource].arbitrate(&self.column_requests, Some(&self.column_metadata), rng);
                if let Some(client) = winner {
                    let metadata = if *self.metadata_present.get(client, resource) {
                        Some(*self.metadata.get(client, resource))
                    } else {
                        None
                    };
                    gr.add_granted_request(Request { client, resource, metadata });
                    //remove the requests from this client and the requests for this resource
                    for other_resource in 0..self.num_resources {
                        *self.requests.get_mut(client, other_resource) = false;
                    }
                    for other_client in 0..self.num_clients {
                        *self.requests.get_mut(other_client, resource) = false;
                    }
                    if self.slip_latch {
                        self.resource_arbiters[resource].latch();
                        self.client_arbiters[client].latch();
                    }
                }
                if !self.slip_latch {
                    self.resource_arbiters[resource].latch();
                }
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
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Plugs;
    use ::rand::SeedableRng;

    fn build(num_clients: usize, num_resources: usize, iterations: usize, rng: &mut StdRng) -> CrSeparableAllocator {
        let plugs = Plugs::default();
        let cv = ConfigurationValue::Object("CrSeparable".to_string(), vec![
            ("iterations".to_string(), ConfigurationValue::Number(iterations as f64)),
            ("slip_latch".to_string(), ConfigurationValue::False),
            ("resource_arbiter".to_string(), ConfigurationValue::Object("Lslp".to_string(), vec![])),
            ("client_arbiter".to_string(), ConfigurationValue::Object("Lslp".to_string(), vec![])),
        ]);
        CrSeparableAllocator::new(AllocatorBuilderArgument { cv: &cv, num_clients, num_resources, plugs: &plugs, rng })
    }

    #[test]
    fn bipartite_matching() {
        let mut rng = StdRng::seed_from_u64(90u64);
        let mut allocator = build(6, 4, 2, &mut rng);
        for _ in 0..100 {
            for client in 0..6 {
                for resource in 0..4 {
                    allocator.add_request(Request::new(client, resource, None));
                }
            }
            let granted: Vec<Request> = allocator.perform_allocation(&mut rng).into_iter().collect();
            let mut per_client = vec![0usize; 6];
            let mut per_resource = vec![0usize; 4];
            for g in granted.iter() {
                per_client[g.client] += 1;
                per_resource[g.resource] += 1;
            }
            assert!(per_client.iter().all(|&x| x <= 1));
            assert!(per_resource.iter().all(|&x| x <= 1));
        }
    }

    #[test]
    fn disjoint_requests_all_granted() {
        let mut rng = StdRng::seed_from_u64(91u64);
        let mut allocator = build(4, 4, 1, &mut rng);
        for client in 0..4 {
            allocator.add_request(Request::new(client, (client + 1) % 4, None));
        }
        let granted: Vec<Request> = allocator.perform_allocation(&mut rng).into_iter().collect();
        assert_eq!(granted.len(), 4);
        for g in granted.iter() {
            assert_eq!(g.resource, (g.client + 1) % 4);
        }
    }
}
