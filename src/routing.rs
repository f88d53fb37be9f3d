
/*!
The interface through which the router core consumes routing decisions.

The core never computes routes: at the route-function-evaluation stage of each input
pipeline it hands the head flit to the simulation's `Routing` object and receives a
multiset of (port, virtual channel) candidates, with no ordering implied. Topology-aware
algorithms live outside this crate and plug in through this trait (or through
`Plugs::routings`); the table-driven implementation here covers tests and small fixed
networks.
*/

use std::rc::Rc;
use std::mem::size_of;

use ::rand::rngs::StdRng;

use crate::{Flit,Packet,Plugs};
use crate::config::ConfigurationValue;
use crate::error::Error;
use crate::quantify::Quantifiable;
use crate::match_object_panic;

///A candidate exit for a packet: one output port plus one virtual channel, with the label
///the algorithm attached to it. Labels become the metadata compared by metadata-comparing
///arbiters, when the router is configured with any.
#[derive(Clone,Debug)]
pub struct CandidateEgress
{
	pub port: usize,
	pub virtual_channel: usize,
	pub label: i32,
}

impl CandidateEgress
{
	pub fn new(port:usize, virtual_channel:usize) -> CandidateEgress
	{
		CandidateEgress{
			port,
			virtual_channel,
			label: 0,
		}
	}
}

///The candidates given by a routing algorithm for some packet at some router.
pub struct RoutingCandidates
{
	pub candidates: Vec<CandidateEgress>,
	///Whether a repeated call with the same state would return the same set. When true and
	///the set is empty the packet can never advance and the router aborts; when false an
	///empty set only means "retry later".
	pub idempotent: bool,
}

impl RoutingCandidates
{
	pub fn len(&self) -> usize
	{
		self.candidates.len()
	}
	pub fn is_empty(&self) -> bool
	{
		self.candidates.is_empty()
	}
}

///Everything a routing algorithm may look at when producing candidates.
#[non_exhaustive]
pub struct RoutingRequest<'a>
{
	pub packet: &'a Rc<Packet>,
	pub router_index: usize,
	pub entry_port: usize,
	pub entry_virtual_channel: usize,
	pub num_virtual_channels: usize,
}

///A routing algorithm as seen by the router core.
pub trait Routing
{
	///The candidate (port, virtual channel) pairs for the packet at its current router.
	fn next(&self, request:&RoutingRequest, rng:&mut StdRng) -> Result<RoutingCandidates,Error>;
	///Informational callback: the packet has been bound to the given egress.
	fn vc_scheduled(&self, _flit:&Rc<Flit>, _port:usize, _virtual_channel:usize)
	{
	}
	///The packet is leaving the network; whatever extension this algorithm attached must be
	///released here, since nobody else may touch it.
	fn packet_leaving(&self, packet:&Packet)
	{
		*packet.routing_extension.borrow_mut() = RoutingExtension::None;
	}
}

/**
Per-packet state a routing algorithm stores on the packet between hops. Routers carry it
untouched; only the algorithm that set a variant may read or clear it, normally once the
packet reaches the router that consumes the information.
**/
#[derive(Debug)]
pub enum RoutingExtension
{
	None,
	///An intermediate node to route through, as in Valiant-style randomization.
	IntermediateAddress(Vec<u32>),
	///Misrouting permits left, per dimension.
	Deroutes(Vec<u32>),
}

impl Default for RoutingExtension
{
	fn default() -> RoutingExtension
	{
		RoutingExtension::None
	}
}

impl Quantifiable for RoutingExtension
{
	fn total_memory(&self) -> usize
	{
		size_of::<RoutingExtension>() + match self
		{
			&RoutingExtension::None => 0,
			&RoutingExtension::IntermediateAddress(ref address) => address.capacity()*size_of::<u32>(),
			&RoutingExtension::Deroutes(ref deroutes) => deroutes.capacity()*size_of::<u32>(),
		}
	}
	fn print_memory_breakdown(&self)
	{
		unimplemented!();
	}
	fn forecast_total_memory(&self) -> usize
	{
		unimplemented!();
	}
}

///Arguments for the routing builder.
#[non_exhaustive]
pub struct RoutingBuilderArgument<'a>
{
	pub cv: &'a ConfigurationValue,
	pub plugs: &'a Plugs,
}

/**
`TableRouting` holds the full candidate table indexed by (current router, destination
terminal). It is what the tests use and doubles as a static routing for small fixed
networks.
```ignore
TableRouting{
	routes: [
		Route{ router:0, destination:1, candidates: [ Egress{port:3, virtual_channel:0}, Egress{port:3, virtual_channel:1} ] },
	],
}
```
**/
pub fn new_routing(arg:RoutingBuilderArgument) -> Box<dyn Routing>
{
	if let &ConfigurationValue::Object(ref cv_name, ref _cv_pairs) = arg.cv
	{
		if let Some(builder) = arg.plugs.routings.get(cv_name)
		{
			return builder(arg);
		}
		match cv_name.as_ref()
		{
			"TableRouting" => Box::new(TableRouting::new(arg)),
			_ => panic!("Unknown routing: {}",cv_name),
		}
	}
	else
	{
		panic!("Trying to create a Routing from a non-Object");
	}
}

///See [new_routing](fn.new_routing.html).
pub struct TableRouting
{
	///`table[router][destination]` is the candidate set.
	table: Vec<Vec<Vec<CandidateEgress>>>,
}

impl TableRouting
{
	pub fn new(arg:RoutingBuilderArgument) -> TableRouting
	{
		let mut routes : Vec<(usize,usize,Vec<CandidateEgress>)> = vec![];
		match_object_panic!(arg.cv,"TableRouting",value,
			"routes" => for route_cv in value.as_array().expect("bad value for routes")
			{
				let mut router = None;
				let mut destination = None;
				let mut candidates = vec![];
				match_object_panic!(route_cv,"Route",route_value,
					"router" => router = Some(route_value.as_usize().expect("bad value for router")),
					"destination" => destination = Some(route_value.as_usize().expect("bad value for destination")),
					"candidates" => for egress_cv in route_value.as_array().expect("bad value for candidates")
					{
						let mut port = None;
						let mut virtual_channel = None;
						let mut label = 0i32;
						match_object_panic!(egress_cv,"Egress",egress_value,
							"port" => port = Some(egress_value.as_usize().expect("bad value for port")),
							"virtual_channel" => virtual_channel = Some(egress_value.as_usize().expect("bad value for virtual_channel")),
							"label" => label = egress_value.as_f64().expect("bad value for label") as i32,
						);
						candidates.push(CandidateEgress{
							port: port.expect("There were no port"),
							virtual_channel: virtual_channel.expect("There were no virtual_channel"),
							label,
						});
					},
				);
				routes.push((
					router.expect("There were no router"),
					destination.expect("There were no destination"),
					candidates,
				));
			},
		);
		let num_routers = routes.iter().map(|&(router,_,_)|router+1).max().unwrap_or(0);
		let num_destinations = routes.iter().map(|&(_,destination,_)|destination+1).max().unwrap_or(0);
		let mut table = vec![ vec![ vec![] ; num_destinations ] ; num_routers ];
		for (router,destination,candidates) in routes
		{
			table[router][destination] = candidates;
		}
		TableRouting{
			table,
		}
	}
	///Build directly from a table, `table[router][destination]` being the candidate set.
	pub fn from_table(table:Vec<Vec<Vec<CandidateEgress>>>) -> TableRouting
	{
		TableRouting{
			table,
		}
	}
}

impl Routing for TableRouting
{
	fn next(&self, request:&RoutingRequest, _rng:&mut StdRng) -> Result<RoutingCandidates,Error>
	{
		let destination = request.packet.message.destination;
		let candidates = self.table[request.router_index][destination].clone();
		Ok(RoutingCandidates{
			candidates,
			idempotent: true,
		})
	}
}
