
use ::rand::rngs::StdRng;

use crate::allocator::{Allocator, Request, GrantedRequests, AllocatorBuilderArgument};
use crate::arbiter::{Arbiter, ArbiterBuilderArgument, new_arbiter};
use crate::config::ConfigurationValue;
use crate::matrix::Matrix;
use crate::match_object_panic;

/**
Resource-then-client separable allocation. Every resource arbiter picks one client among
the requests of its column; the client arbiters then enforce at most one grant per client
over that intermediate stage. When a client accepts a resource, its other requests and the
other requests on that resource are removed, and the pass repeats `iterations` times over
the leftovers.

With `slip_latch: true` only the arbiters whose grant was accepted advance their priority,
which is the iSLIP discipline; otherwise every arbiter advances on every iteration.
```ignore
RcSeparable{
	iterations: 2,
	slip_latch: true,
	resource_arbiter: Lslp{},
	client_arbiter: Lslp{},
}
```
`Islip{...}` is accepted as an alias.
**/
pub struct RcSeparableAllocator {
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
    /// Winners of the resource pass, read by the client arbiters.
    intermediate: Matrix<bool>,
    //column scratch buffers handed to the resource arbiters.
    column_requests: Vec<bool>,
    column_metadata: Vec<u64>,
}

impl RcSeparableAllocator {
    pub fn new(args: AllocatorBuilderArgument) -> RcSeparableAllocator {
        if args.num_clients == 0 || args.num_resources == 0 {
            panic!("Invalid arguments for RcSeparableAllocator");
        }
        let mut iterations = None;
        let mut slip_latch = None;
        let mut resource_arbiter_cv = None;
        let mut client_arbiter_cv = None;
        match_object_panic!(args.cv, "RcSeparable", value,
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
        RcSeparableAllocator {
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

impl Allocator for RcSeparableAllocator {
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
            //resource pass over the remaining requests
            self.intermediate.fill(false);
            for resource in 0..self.num_resources {
                self.requests.copy_column_into(resource, &mut self.column_requests);
                self.metadata.copy_column_into(resource, &mut self.column_metadata);
                let winner = self.resource_arbiters[resource].arbitrate(&self.column_requests, Some(&self.column_metadata), rng);
                if let Some(client) = winner {
                    *self.intermediate.get_mut(client, resource) = true;
                }
                if !self.slip_latch {
                    self.resource_arbiters[resource].latch();
                }
            }
            //client pass enforcing one resource per client
            for client in 0..self.num_clients {
                let winner = self.client_arbiters[client].arbitrate(self.intermediate.row(client), Some(self.metadata.row(client)), rng);
                if let Some(resource) = winner {
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
                        self.client_arbiters[client].latch();
                        self.resource_arbiters[resource].latch();
                    }
                }
                if !self.slip_latch {
                    self.client_arbiters[client].latch();
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

    fn build(num_clients: usize, num_resources: usize, iterations: usize, slip_latch: bool, rng: &mut StdRng) -> RcSeparableAllocator {
        let plugs = Plugs::default();
        let cv = ConfigurationValue::Object("RcSeparable".to_string(), vec![
            ("iterations".to_string(), ConfigurationValue::Number(iterations as f64)),
            ("slip_latch".to_string(), if slip_latch { ConfigurationValue::True } else { ConfigurationValue::False }),
            ("resource_arbiter".to_string(), ConfigurationValue::Object("Lslp".to_string(), vec![])),
            ("client_arbiter".to_string(), ConfigurationValue::Object("Lslp".to_string(), vec![])),
        ]);
        RcSeparableAllocator::new(AllocatorBuilderArgument { cv: &cv, num_clients, num_resources, plugs: &plugs, rng })
    }

    #[test]
    fn bipartite_matching() {
        let mut rng = StdRng::seed_from_u64(80u64);
        let mut allocator = build(8, 8, 2, true, &mut rng);
        for _ in 0..100 {
            for client in 0..8 {
                for resource in 0..8 {
                    allocator.add_request(Request::new(client, resource, None));
                }
            }
            let granted: Vec<Request> = allocator.perform_allocation(&mut rng).into_iter().collect();
            let mut per_client = vec![0usize; 8];
            let mut per_resource = vec![0usize; 8];
            for g in granted.iter() {
                per_client[g.client] += 1;
                per_resource[g.resource] += 1;
            }
            assert!(per_client.iter().all(|&x| x <= 1));
            assert!(per_resource.iter().all(|&x| x <= 1));
        }
    }

    #[test]
    fn full_contention_saturates()
    {
        //With everyone requesting everything and a couple of iterations, iSLIP converges to
        //a perfect matching after the priorities desynchronize.
        let mut rng = StdRng::seed_from_u64(81u64);
        let num = 4;
        let mut allocator = build(num, num, 2, true, &mut rng);
        let mut last_sizes = Vec::new();
        for _ in 0..50 {
            for client in 0..num {
                for resource in 0..num {
                    allocator.add_request(Request::new(client, resource, None));
                }
            }
            last_sizes.push(allocator.perform_allocation(&mut rng).len());
        }
        assert_eq!(*last_sizes.last().unwrap(), num, "iSLIP should reach a full matching under saturation");
    }

    #[test]
    fn islip_load_balance() {
        //Scenario: 16 clients all requesting the same 8 resources. Over many cycles each
        //(client, resource) pair must receive close to 1/8 of that client's grants, and no
        //other pair may be granted at all.
        let mut rng = StdRng::seed_from_u64(82u64);
        let num_clients = 16;
        let num_resources = 16;
        let requested = 8;
        let cycles = 100_000usize;
        let mut allocator = build(num_clients, num_resources, 3, true, &mut rng);
        let mut grants = Matrix::constant(0usize, num_clients, num_resources);
        let mut per_client = vec![0usize; num_clients];
        for _ in 0..cycles {
            for client in 0..num_clients {
                for resource in 0..requested {
                    allocator.add_request(Request::new(client, resource, None));
                }
            }
            for g in allocator.perform_allocation(&mut rng) {
                assert!(g.resource < requested, "grant for a resource that was never requested");
                *grants.get_mut(g.client, g.resource) += 1;
                per_client[g.client] += 1;
            }
        }
        for client in 0..num_clients {
            assert!(per_client[client] > 0);
            for resource in 0..requested {
                let fraction = *grants.get(client, resource) as f64 / per_client[client] as f64;
                assert!((fraction - 1.0 / requested as f64).abs() < 0.01,
                    "client {} resource {} got fraction {}", client, resource, fraction);
            }
        }
    }
}
