
use ::rand::{Rng,rngs::StdRng};

use crate::allocator::{Allocator, Request, GrantedRequests, AllocatorBuilderArgument};
use crate::config::ConfigurationValue;
use crate::matrix::Matrix;
use crate::match_object_panic;

enum PriorityScheme {
    Sequential,
    Random,
}

/**
Folds the clients×resources grid into a rows×cols rectangle with rows ≥ cols and sweeps its
diagonal lines starting at a priority line: the first requested cell found on a diagonal
whose row and column are still unconsumed wins them. Cells on one diagonal never conflict,
which is what makes the sweep a parallel matching. The starting line advances by one each
allocation (`scheme: "sequential"`) or is redrawn at random (`scheme: "random"`). Metadata
is ignored.
```ignore
Wavefront{
	scheme: "random",
}
```
**/
pub struct WavefrontAllocator {
    /// The max number of inputs of the router crossbar
    num_clients: usize,
    /// The max number of outputs of the router crossbar
    num_resources: usize,
    rows: usize,
    cols: usize,
    scheme: PriorityScheme,
    /// The request grid, rows are clients and columns are resources.
    requests: Matrix<bool>,
    //row/column consumption flags, reset on each allocation.
    row_grants: Vec<bool>,
    col_grants: Vec<bool>,
    /// The diagonal where the sweep begins.
    starting_line: usize,
}

impl WavefrontAllocator {
    pub fn new(args: AllocatorBuilderArgument) -> WavefrontAllocator {
        if args.num_clients == 0 || args.num_resources == 0 {
            panic!("Invalid arguments for WavefrontAllocator");
        }
        let mut scheme = None;
        match_object_panic!(args.cv, "Wavefront", value,
            "scheme" => scheme = Some(match value.as_str().expect("bad value for scheme") {
                "sequential" => PriorityScheme::Sequential,
                "random" => PriorityScheme::Random,
                s => panic!("invalid wavefront priority scheme: {}", s),
            }),
        );
        let scheme = scheme.expect("There were no scheme");
        let (rows, cols) = if args.num_clients > args.num_resources {
            (args.num_clients, args.num_resources)
        } else {
            (args.num_resources, args.num_clients)
        };
        let starting_line = args.rng.gen_range(0..rows);
        WavefrontAllocator {
            num_clients: args.num_clients,
            num_resources: args.num_resources,
            rows,
            cols,
            scheme,
            requests: Matrix::constant(false, args.num_clients, args.num_resources),
            row_grants: vec![false; rows],
            col_grants: vec![false; cols],
            starting_line,
        }
    }
    ///The folded coordinates of a (client, resource) pair. Rows always hold the larger side.
    fn to_row_col(&self, client: usize, resource: usize) -> (usize, usize) {
        if self.num_clients > self.num_resources {
            (client, resource)
        } else {
            (resource, client)
        }
    }
    fn to_client_resource(&self, row: usize, col: usize) -> (usize, usize) {
        if self.num_clients > self.num_resources {
            (row, col)
        } else {
            (col, row)
        }
    }
    ///The row of the cell of diagonal `line` at column `col`.
    fn to_row(&self, line: usize, col: usize) -> usize {
        if col > line {
            line + self.rows - col
        } else {
            line - col
        }
    }
}

impl Allocator for WavefrontAllocator {
    fn add_request(&mut self, request: Request) {
        if request.client >= self.num_clients || request.resource >= self.num_resources {
            panic!("Invalid request: client {} of {}, resource {} of {}", request.client, self.num_clients, request.resource, self.num_resources);
        }
        *self.requests.get_mut(request.client, request.resource) = true;
    }
    fn perform_allocation(&mut self, rng: &mut StdRng) -> GrantedRequests {
        let mut gr = GrantedRequests::default();
        for flag in self.row_grants.iter_mut() {
            *flag = false;
        }
        for flag in self.col_grants.iter_mut() {
            *flag = false;
        }
        for line_offset in 0..self.rows {
            let line = (self.starting_line + line_offset) % self.rows;
            for col in 0..self.cols {
                if self.col_grants[col] {
                    continue;
                }
                let row = self.to_row(line, col);
                if self.row_grants[row] {
                    continue;
                }
                let (client, resource) = self.to_client_resource(row, col);
                if *self.requests.get(client, resource) {
                    gr.add_granted_request(Request { client, resource, metadata: None });
                    self.col_grants[col] = true;
                    self.row_grants[row] = true;
                }
            }
        }
        match self.scheme {
            PriorityScheme::Sequential => self.starting_line = (self.starting_line + 1) % self.rows,
            PriorityScheme::Random => self.starting_line = rng.gen_range(0..self.rows),
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

    fn build(num_clients: usize, num_resources: usize, scheme: &str, rng: &mut StdRng) -> WavefrontAllocator {
        let plugs = Plugs::default();
        let cv = ConfigurationValue::Object("Wavefront".to_string(), vec![
            ("scheme".to_string(), ConfigurationValue::Literal(scheme.to_string())),
        ]);
        WavefrontAllocator::new(AllocatorBuilderArgument { cv: &cv, num_clients, num_resources, plugs: &plugs, rng })
    }

    #[test]
    fn folding_is_consistent() {
        let mut rng = StdRng::seed_from_u64(100u64);
        let allocator = build(3, 5, "sequential", &mut rng);
        for client in 0..3 {
            for resource in 0..5 {
                let (row, col) = allocator.to_row_col(client, resource);
                assert!(row < allocator.rows && col < allocator.cols);
                assert_eq!(allocator.to_client_resource(row, col), (client, resource));
            }
        }
    }

    #[test]
    fn bipartite_matching() {
        let mut rng = StdRng::seed_from_u64(101u64);
        let mut allocator = build(5, 5, "random", &mut rng);
        for _ in 0..200 {
            for client in 0..5 {
                for resource in 0..5 {
                    allocator.add_request(Request::new(client, resource, None));
                }
            }
            let granted: Vec<Request> = allocator.perform_allocation(&mut rng).into_iter().collect();
            //under full request pressure the wavefront produces a perfect matching
            assert_eq!(granted.len(), 5);
            let mut per_client = vec![0usize; 5];
            let mut per_resource = vec![0usize; 5];
            for g in granted.iter() {
                per_client[g.client] += 1;
                per_resource[g.resource] += 1;
            }
            assert!(per_client.iter().all(|&x| x == 1));
            assert!(per_resource.iter().all(|&x| x == 1));
        }
    }

    #[test]
    fn load_balance_under_rotation() {
        //Every client requests the same bank of resources; over many allocations with the
        //sequential scheme, each client's grants spread evenly over its requested resources.
        let mut rng = StdRng::seed_from_u64(102u64);
        let num = 8;
        let requested = 4;
        let cycles = 100_000usize;
        let mut allocator = build(num, num, "sequential", &mut rng);
        let mut grants = Matrix::constant(0usize, num, num);
        let mut per_client = vec![0usize; num];
        for _ in 0..cycles {
            for client in 0..num {
                for resource in 0..requested {
                    allocator.add_request(Request::new(client, resource, None));
                }
            }
            for g in allocator.perform_allocation(&mut rng) {
                assert!(g.resource < requested);
                *grants.get_mut(g.client, g.resource) += 1;
                per_client[g.client] += 1;
            }
        }
        for client in 0..num {
            for resource in 0..requested {
                let fraction = *grants.get(client, resource) as f64 / per_client[client] as f64;
                assert!((fraction - 1.0 / requested as f64).abs() < 0.01,
                    "client {} resource {} got fraction {}", client, resource, fraction);
            }
        }
    }

    #[test]
    fn grants_follow_requests() {
        let mut rng = StdRng::seed_from_u64(103u64);
        let mut allocator = build(4, 6, "random", &mut rng);
        allocator.add_request(Request::new(2, 5, None));
        allocator.add_request(Request::new(0, 1, None));
        let granted: Vec<Request> = allocator.perform_allocation(&mut rng).into_iter().collect();
        assert_eq!(granted.len(), 2);
        for g in granted.iter() {
            assert!((g.client == 2 && g.resource == 5) || (g.client == 0 && g.resource == 1));
        }
    }
}
