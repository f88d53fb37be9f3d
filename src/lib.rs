/*!
telar-lib
=====

This crate provides the TELAR switching fabric as a library: the arbitration and scheduling
core of a cycle-accurate interconnection network simulator. It covers the router internals
(arbiters, allocators, virtual-channel and crossbar schedulers, input/output queue
pipelines, credit-based flow control) together with the discrete-event machinery to drive
them. Topology generation, routing algorithms, and traffic synthesis are collaborators
plugged in from outside; the crate ships a table-driven routing and direct terminal
injection so that fabrics can be exercised on their own.

# Usage

This crate is `telar-lib`. To use it add `telar-lib` to your dependencies in your project's `Cargo.toml`.

```toml
[dependencies]
telar-lib = "0.2"
```

# Configuration Syntax

Components are built from `ConfigurationValue` trees. A frontend may obtain them however it
pleases; written down, a small two-router fabric looks as follows.

```ignore
Configuration
{
	random_seed: 42,
	warmup: 0,
	measured: 1000,
	maximum_packet_size: 4,
	metadata_handler: "creation_timestamp",
	router: InputOutputQueued
	{
		virtual_channels: 2,
		input_queue_depth: 8,
		output_queue_depth: 8,
		vc_scheduler: VcScheduler{ allocator: RcSeparable{ iterations:1, slip_latch:true, resource_arbiter:Lslp{}, client_arbiter:Lslp{} } },
		crossbar_scheduler: CrossbarScheduler{ full_packet:false, packet_lock:false, idle_unlock:false, allocator: Islip{ iterations:2, slip_latch:true, resource_arbiter:Lslp{}, client_arbiter:Lslp{} } },
		output_crossbar_scheduler: CrossbarScheduler{ full_packet:false, packet_lock:false, idle_unlock:false, allocator: Islip{ iterations:1, slip_latch:true, resource_arbiter:Lslp{}, client_arbiter:Lslp{} } },
		congestion_mode: "downstream",
		congestion_status: CongestionStatus{ style: "relative" },
	},
	routing: TableRouting{ routes: [ Route{ router:0, destination:1, candidates:[ Egress{port:1, virtual_channel:0} ] } ] },
	link_classes: [
		LinkClass{ delay:1 },//router to router
		LinkClass{ delay:1 },//terminal to router
	],
	wiring: Wiring
	{
		routers: 2,
		ports_per_router: 2,
		terminals: 2,
		links: [ Link{ first_router:0, first_port:1, second_router:1, second_port:1, link_class:0 } ],
		terminal_links: [
			TerminalLink{ terminal:0, router:0, port:0, link_class:1 },
			TerminalLink{ terminal:1, router:1, port:0, link_class:1 },
		],
	},
}
```

# Plugging

The component factories (`new_router`, `new_routing`, `new_allocator`, `new_arbiter`)
receive a `&Plugs` argument that may be used to provide the fabric with new
implementations: register a builder under the object name and the factories will prefer it.

*/

pub use quantifiable_derive::Quantifiable;//the derive macro

pub mod config;
pub mod error;
pub mod quantify;
pub mod matrix;
pub mod event;
pub mod arbiter;
pub mod allocator;
pub mod scheduler;
pub mod congestion;
pub mod routing;
pub mod router;
pub mod stats;

use std::rc::Rc;
use std::cell::RefCell;
use std::collections::{VecDeque,BTreeMap};

use rand::{rngs::StdRng,SeedableRng};

use config::ConfigurationValue;
use event::{EventQueue,Event,Time};
use quantify::Quantifiable;
use router::{Router,RouterBuilderArgument,new_router,Credit};
use routing::{Routing,RoutingBuilderArgument,RoutingExtension,new_routing};
use stats::{MessageLog,VecMessageLog};
pub use stats::MessageRecord;

///The smallest flow-control unit. A packet is an ordered sequence of flits; the first one
///is the head and the last one the tail, and routers establish and tear down per-packet
///state on them.
#[derive(Quantifiable)]
#[derive(Debug)]
pub struct Flit
{
	///The packet to which this flit belongs.
	pub packet: Rc<Packet>,
	///position inside the packet
	pub index: usize,
	///The virtual channel in which this flit travels. Set by the terminal on heads,
	///rewritten at every allocation; body and tail follow their head.
	pub virtual_channel: RefCell<Option<usize>>,
	///The cycle the flit left its terminal.
	pub send_cycle: RefCell<Time>,
	///The cycle the flit reached its destination terminal.
	pub receive_cycle: RefCell<Time>,
}

impl Flit
{
	///Whether the flit is leading a packet. Routers check this to make requests, establish flows, etc.
	pub fn is_head(&self) -> bool
	{
		self.index==0
	}
	///Whether this flit is the last one of a packet. Routers use this to finalize some operations.
	pub fn is_tail(&self) -> bool
	{
		self.index==self.packet.size-1
	}
}

///A portion of a message. They are divided into flits.
///All flits must go through the same queues without flits of other packets in between.
#[derive(Quantifiable)]
#[derive(Debug)]
pub struct Packet
{
	///Number of flits
	pub size: usize,
	///The message to which this packet belongs.
	pub message: Rc<Message>,
	///position inside the message
	pub index: usize,
	///Number of routers the packet has passed through.
	pub hop_count: RefCell<usize>,
	///Value given by the metadata handler at creation, consumed by metadata-comparing arbiters.
	pub metadata: RefCell<u64>,
	///Whatever the routing algorithm stores on the packet between hops. Owned by the
	///packet, managed exclusively by the algorithm that sets it.
	pub routing_extension: RefCell<RoutingExtension>,
	///The cycle when the leading flit was inserted into the first router.
	///We set it to 0 if the packet has not entered the network yet.
	pub cycle_into_network: RefCell<Time>,
}

///An application message, broken into packets.
#[derive(Quantifiable)]
#[derive(Debug)]
pub struct Message
{
	///Terminal that created the message.
	pub origin: usize,
	///Terminal that is the destination of the message.
	pub destination: usize,
	///Multi-dimensional coordinates of the origin.
	pub source_address: Vec<u32>,
	///Multi-dimensional coordinates of the destination.
	pub destination_address: Vec<u32>,
	///Number of flits.
	pub size: usize,
	///Cycle when the message was created.
	pub creation_cycle: Time,
	///The transaction the message belongs to.
	pub transaction: u64,
	pub traffic_class: u32,
	pub protocol_class: u32,
	pub op_code: u32,
}

///A location where a flit or credit can be delivered.
///None is used for disconnected ports.
#[derive(Clone,Debug,Quantifiable,Hash,Eq,PartialEq)]
pub enum Location
{
	RouterPort{
		router_index: usize,
		router_port: usize,
	},
	TerminalPort(usize),
	None,
}

///Description of common properties of sets of links.
///For example, the links to terminals could have a different delay.
#[derive(Clone,Debug)]
pub struct LinkClass
{
	///Cycles a flit needs to move from one endpoint to the other endpoint.
	pub delay: Time,
	///Base cycles per channel cycle: flits and credit envelopes move through the link at
	///cycles multiple of it.
	pub frequency_divisor: Time,
}

impl LinkClass
{
	fn new(cv:&ConfigurationValue) -> LinkClass
	{
		let mut delay = None;
		let mut frequency_divisor = 1;
		match_object_panic!(cv,"LinkClass",value,
			"delay" => delay = Some(value.as_time().expect("bad value for delay")),
			"frequency_divisor" => frequency_divisor = value.as_time().expect("bad value for frequency_divisor"),
		);
		let delay = delay.expect("There were no delay");
		if delay==0
		{
			//a zero-delay arrival would land in the begin phase of the cycle already running
			panic!("link delay must be nonzero");
		}
		if frequency_divisor==0
		{
			panic!("link frequency_divisor must be nonzero");
		}
		LinkClass{
			delay,
			frequency_divisor,
		}
	}
}

///How packets get the metadata that metadata-comparing arbiters read.
#[derive(Clone,Copy,Debug)]
pub enum MetadataHandler
{
	///Every packet gets metadata 0.
	Zero,
	///Packets carry their creation cycle, so comparing arbiters favour age.
	CreationTimestamp,
}

impl MetadataHandler
{
	pub fn parse(handler:&str) -> MetadataHandler
	{
		match handler
		{
			"zero" => MetadataHandler::Zero,
			"creation_timestamp" => MetadataHandler::CreationTimestamp,
			_ => panic!("invalid metadata handler: {}",handler),
		}
	}
}

///Plugged functions to build routers, routings, allocators, and arbiters.
#[derive(Default)]
pub struct Plugs
{
	pub routers: BTreeMap<String, Box<dyn for<'a> Fn(RouterBuilderArgument<'a>) -> Rc<RefCell<dyn Router>>>>,
	pub routings: BTreeMap<String, Box<dyn for<'a> Fn(RoutingBuilderArgument<'a>) -> Box<dyn Routing>>>,
	pub allocators: BTreeMap<String, Box<dyn for<'a> Fn(allocator::AllocatorBuilderArgument<'a>) -> Box<dyn allocator::Allocator>>>,
	pub arbiters: BTreeMap<String, Box<dyn for<'a> Fn(arbiter::ArbiterBuilderArgument<'a>) -> Box<dyn arbiter::Arbiter>>>,
}

///How the routers and terminals are connected. Topology construction is outside the core;
///whoever knows the topology writes it down as this table.
pub struct Wiring
{
	///`router_ports[router][port] = (other endpoint, link class)`.
	router_ports: Vec<Vec<(Location,usize)>>,
	///`terminal_ports[terminal] = (router side, link class)`.
	terminal_ports: Vec<(Location,usize)>,
}

impl Wiring
{
	pub fn new(cv:&ConfigurationValue) -> Wiring
	{
		let mut routers = None;
		let mut ports_per_router = None;
		let mut terminals = None;
		let mut links : Vec<(usize,usize,usize,usize,usize)> = vec![];
		let mut terminal_links : Vec<(usize,usize,usize,usize)> = vec![];
		match_object_panic!(cv,"Wiring",value,
			"routers" => routers = Some(value.as_usize().expect("bad value for routers")),
			"ports_per_router" => ports_per_router = Some(value.as_usize().expect("bad value for ports_per_router")),
			"terminals" => terminals = Some(value.as_usize().expect("bad value for terminals")),
			"links" => for link_cv in value.as_array().expect("bad value for links")
			{
				let mut first_router = None;
				let mut first_port = None;
				let mut second_router = None;
				let mut second_port = None;
				let mut link_class = None;
				match_object_panic!(link_cv,"Link",link_value,
					"first_router" => first_router = Some(link_value.as_usize().expect("bad value for first_router")),
					"first_port" => first_port = Some(link_value.as_usize().expect("bad value for first_port")),
					"second_router" => second_router = Some(link_value.as_usize().expect("bad value for second_router")),
					"second_port" => second_port = Some(link_value.as_usize().expect("bad value for second_port")),
					"link_class" => link_class = Some(link_value.as_usize().expect("bad value for link_class")),
				);
				links.push((
					first_router.expect("There were no first_router"),
					first_port.expect("There were no first_port"),
					second_router.expect("There were no second_router"),
					second_port.expect("There were no second_port"),
					link_class.expect("There were no link_class"),
				));
			},
			"terminal_links" => for link_cv in value.as_array().expect("bad value for terminal_links")
			{
				let mut terminal = None;
				let mut router = None;
				let mut port = None;
				let mut link_class = None;
				match_object_panic!(link_cv,"TerminalLink",link_value,
					"terminal" => terminal = Some(link_value.as_usize().expect("bad value for terminal")),
					"router" => router = Some(link_value.as_usize().expect("bad value for router")),
					"port" => port = Some(link_value.as_usize().expect("bad value for port")),
					"link_class" => link_class = Some(link_value.as_usize().expect("bad value for link_class")),
				);
				terminal_links.push((
					terminal.expect("There were no terminal"),
					router.expect("There were no router"),
					port.expect("There were no port"),
					link_class.expect("There were no link_class"),
				));
			},
		);
		let routers = routers.expect("There were no routers");
		let ports_per_router = ports_per_router.expect("There were no ports_per_router");
		let terminals = terminals.expect("There were no terminals");
		let mut wiring = Wiring{
			router_ports: vec![ vec![ (Location::None,0) ; ports_per_router ] ; routers ],
			terminal_ports: vec![ (Location::None,0) ; terminals ],
		};
		for (first_router,first_port,second_router,second_port,link_class) in links
		{
			wiring.connect(first_router,first_port,Location::RouterPort{router_index:second_router,router_port:second_port},link_class);
			wiring.connect(second_router,second_port,Location::RouterPort{router_index:first_router,router_port:first_port},link_class);
		}
		for (terminal,router,port,link_class) in terminal_links
		{
			wiring.connect(router,port,Location::TerminalPort(terminal),link_class);
			if let Location::None = wiring.terminal_ports[terminal].0
			{
				wiring.terminal_ports[terminal] = (Location::RouterPort{router_index:router,router_port:port},link_class);
			}
			else
			{
				panic!("terminal {} wired twice",terminal);
			}
		}
		wiring
	}
	fn connect(&mut self, router:usize, port:usize, endpoint:Location, link_class:usize)
	{
		if let Location::None = self.router_ports[router][port].0
		{
			self.router_ports[router][port] = (endpoint,link_class);
		}
		else
		{
			panic!("port {} of router {} wired twice",port,router);
		}
	}
	pub fn num_routers(&self) -> usize
	{
		self.router_ports.len()
	}
	pub fn num_terminals(&self) -> usize
	{
		self.terminal_ports.len()
	}
	pub fn ports(&self, router:usize) -> usize
	{
		self.router_ports[router].len()
	}
	///The endpoint and link class at the other side of a router port.
	pub fn neighbour(&self, router:usize, port:usize) -> (Location,usize)
	{
		self.router_ports[router][port].clone()
	}
	///The router side and link class of a terminal's attachment.
	pub fn terminal_neighbour(&self, terminal:usize) -> (Location,usize)
	{
		self.terminal_ports[terminal].clone()
	}
}

///Statistics local to a terminal.
#[derive(Debug,Default,Clone)]
pub struct TerminalStatistics
{
	pub created_flits: usize,
	pub consumed_flits: usize,
	pub consumed_messages: usize,
	pub total_message_delay: Time,
}

///The endpoints that inject and eject flits. Traffic synthesis is outside the core, so
///terminals only stream out whatever messages they are handed through
///`Simulation::inject_message` and consume what the network delivers to them.
pub struct Terminal
{
	///The index of the terminal in the network.
	index: usize,
	///To which router port the terminal is connected, plus link class index.
	port: (Location,usize),
	///Known available space in the input buffers of the connected router, per virtual channel.
	router_credits: Vec<usize>,
	///Flits awaiting injection.
	stored_flits: VecDeque<Rc<Flit>>,
	///The virtual channel of the packet currently being streamed.
	current_virtual_channel: Option<usize>,
	///For each message in flight we accumulate its arrived flits, until the whole message
	///is consumed and reported to the message log.
	consumed_flits: BTreeMap<*const Message,Vec<Rc<Flit>>>,
	///Statistics local to the terminal.
	pub statistics: TerminalStatistics,
}

impl Terminal
{
	///Extract the next flit to put on the link, if flow control allows it. A head flit only
	///leaves when the router has room for its whole packet, so the packet streams in
	///back-to-back channel cycles as the routers require.
	fn try_emit(&mut self, cycle:Time) -> Option<Rc<Flit>>
	{
		let virtual_channel =
		{
			let flit = self.stored_flits.front()?;
			if flit.is_head()
			{
				let virtual_channel = flit.virtual_channel.borrow().expect("injected head flit without virtual channel");
				if self.router_credits[virtual_channel] < flit.packet.size
				{
					return None;
				}
				virtual_channel
			}
			else
			{
				self.current_virtual_channel.expect("streaming a body flit without an open packet")
			}
		};
		let flit = self.stored_flits.pop_front().expect("There are no flits");
		self.router_credits[virtual_channel] -= 1;
		self.current_virtual_channel = if flit.is_tail() { None } else { Some(virtual_channel) };
		*flit.send_cycle.borrow_mut() = cycle;
		self.statistics.created_flits += 1;
		Some(flit)
	}
	///Consumes a flit arriving from the network.
	fn consume(&mut self, flit:Rc<Flit>, cycle:Time, message_log:&mut dyn MessageLog)
	{
		*flit.receive_cycle.borrow_mut() = cycle;
		self.statistics.consumed_flits += 1;
		let message = flit.packet.message.clone();
		if message.destination!=self.index
		{
			panic!("Flit reached terminal {} instead of {}!",self.index,message.destination);
		}
		let message_ptr = message.as_ref() as *const Message;
		let complete =
		{
			let arrived = self.consumed_flits.entry(message_ptr).or_insert_with(Vec::new);
			arrived.push(flit.clone());
			arrived.len()==message.size
		};
		if complete
		{
			//The whole message has been consumed
			if !flit.is_tail()
			{
				panic!("message was consumed by a non-ending flit.");
			}
			let arrived = self.consumed_flits.remove(&message_ptr).expect("just inserted");
			self.statistics.consumed_messages += 1;
			self.statistics.total_message_delay += cycle-message.creation_cycle;
			message_log.log_message(&message,&arrived,cycle);
			message_log.end_transaction(message.transaction,cycle);
		}
	}
	///Known credits toward the router input buffers, per virtual channel.
	pub fn available_credits(&self, virtual_channel:usize) -> usize
	{
		self.router_credits[virtual_channel]
	}
}

///An instantiated fabric, with all its routers and terminals.
pub struct Network
{
	pub wiring: Wiring,
	//The only reason to use Rc instead of Box is to make them insertable on the event queue.
	///The collection of all the routers in the network.
	pub routers: Vec<Rc<RefCell<dyn Router>>>,
	///The collection of all the terminals in the network.
	pub terminals: Vec<Terminal>,
}

impl Quantifiable for Network
{
	fn total_memory(&self) -> usize
	{
		let mut total = std::mem::size_of::<Network>() + self.routers.total_memory();
		for router in self.routers.iter()
		{
			let borrowed = router.borrow();
			total += borrowed.total_memory();
			for flit in borrowed.iter_flits()
			{
				total += flit.as_ref().total_memory();
				if flit.is_tail()
				{
					total += flit.packet.as_ref().total_memory();
				}
			}
		}
		for terminal in self.terminals.iter()
		{
			for flit in terminal.stored_flits.iter()
			{
				total += flit.as_ref().total_memory();
			}
		}
		total
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

///The part of the simulation state components read while processing their events.
pub struct SimulationShared
{
	///The current cycle, i.e., the current discrete time.
	pub cycle: Time,
	///The instantiated network, with its routers and terminals connected by the wiring.
	pub network: Network,
	///The routing algorithm the routers consult for candidate egresses.
	pub routing: Box<dyn Routing>,
	///The properties associated to each link class.
	pub link_classes: Vec<LinkClass>,
	///The maximum number of flits a packet can have.
	pub maximum_packet_size: usize,
	///The frequency divisor of the router clocks, unless overridden per router.
	pub general_frequency_divisor: Time,
}

impl SimulationShared
{
	///Build the event arrival of something through a link, aligned to the link's cycle.
	pub fn schedule_link_arrival(&self, link_class:usize, event:Event) -> event::EventGeneration
	{
		let link = &self.link_classes[link_class];
		let target = event::round_to_multiple(self.cycle+link.delay,link.frequency_divisor);
		event::EventGeneration{
			delay: target-self.cycle,
			position: event::CyclePosition::Begin,
			event,
		}
	}
}

///The mutable part of the simulation state, handed separately to the components so they
///can mutate it while reading the shared part.
pub struct SimulationMut
{
	///The random number generator itself, with its current state. Seeded once; no
	///component may reseed it.
	pub rng: StdRng,
	///Where message deliveries are reported. The core only sees it as a `MessageLog`;
	///the harness keeps the records in memory.
	pub message_log: VecMessageLog,
}

///The object representing the whole simulation.
pub struct Simulation<'a>
{
	///The whole configuration.
	#[allow(dead_code)]
	pub configuration: ConfigurationValue,
	///The seed of the random number generator.
	#[allow(dead_code)]
	pub seed: usize,
	///Cycles of preparation before the actual measured execution.
	pub warmup: Time,
	///Cycles of measurement.
	pub measured: Time,
	///The state shared with the components.
	pub shared: SimulationShared,
	///The state the components mutate.
	pub mutable: SimulationMut,
	///How packets receive their metadata.
	pub metadata_handler: MetadataHandler,
	///The queue of events guiding the simulation.
	pub event_queue: EventQueue,
	///Transactions opened so far, to give fresh identifiers.
	transaction_count: u64,
	///Plugged functions to build routers, routings, etc.
	pub plugs: &'a Plugs,
}

impl<'a> Simulation<'a>
{
	pub fn new(cv:&ConfigurationValue, plugs:&'a Plugs) -> Simulation<'a>
	{
		let mut seed = None;
		let mut warmup = None;
		let mut measured = None;
		let mut maximum_packet_size = None;
		let mut general_frequency_divisor = 1;
		let mut router_cfg : Option<&ConfigurationValue> = None;
		let mut routing_cfg : Option<&ConfigurationValue> = None;
		let mut link_classes : Option<Vec<LinkClass>> = None;
		let mut wiring_cfg : Option<&ConfigurationValue> = None;
		let mut metadata_handler = MetadataHandler::Zero;
		match_object_panic!(cv,"Configuration",value,
			"random_seed" => seed = Some(value.as_usize().expect("bad value for random_seed")),
			"warmup" => warmup = Some(value.as_time().expect("bad value for warmup")),
			"measured" => measured = Some(value.as_time().expect("bad value for measured")),
			"maximum_packet_size" => maximum_packet_size = Some(value.as_usize().expect("bad value for maximum_packet_size")),
			"general_frequency_divisor" => general_frequency_divisor = value.as_time().expect("bad value for general_frequency_divisor"),
			"router" => router_cfg = Some(value),
			"routing" => routing_cfg = Some(value),
			"link_classes" => link_classes = Some(value.as_array().expect("bad value for link_classes").iter().map(LinkClass::new).collect()),
			"wiring" => wiring_cfg = Some(value),
			"metadata_handler" => metadata_handler = MetadataHandler::parse(value.as_str().expect("bad value for metadata_handler")),
		);
		let seed = seed.expect("There were no random_seed");
		let warmup = warmup.expect("There were no warmup");
		let measured = measured.expect("There were no measured");
		let maximum_packet_size = maximum_packet_size.expect("There were no maximum_packet_size");
		let router_cfg = router_cfg.expect("There were no router");
		let routing_cfg = routing_cfg.expect("There were no routing");
		let link_classes = link_classes.expect("There were no link_classes");
		let wiring_cfg = wiring_cfg.expect("There were no wiring");
		let mut rng = StdRng::seed_from_u64(seed as u64);
		let wiring = Wiring::new(wiring_cfg);
		let routing = new_routing(RoutingBuilderArgument{
			cv: routing_cfg,
			plugs,
		});
		let num_routers = wiring.num_routers();
		let routers : Vec<Rc<RefCell<dyn Router>>> = (0..num_routers).map(|router_index|{
			let num_ports = wiring.ports(router_index);
			let port_link_class : Vec<usize> = (0..num_ports).map(|port|wiring.neighbour(router_index,port).1).collect();
			new_router(RouterBuilderArgument{
				router_index,
				cv: router_cfg,
				plugs,
				num_ports,
				port_link_class: &port_link_class,
				link_classes: &link_classes,
				maximum_packet_size,
				general_frequency_divisor,
				rng: &mut rng,
			})
		}).collect();
		let terminals = (0..wiring.num_terminals()).map(|index|{
			let port = wiring.terminal_neighbour(index);
			let router_credits = match port.0
			{
				Location::RouterPort{ router_index, router_port } =>
				{
					let router = routers[router_index].borrow();
					let num_virtual_channels = router.num_virtual_channels();
					(0..num_virtual_channels).map(|virtual_channel|router.input_queue_size(router_port,virtual_channel)).collect()
				},
				_ => panic!("Terminal {} is not connected to a router",index),
			};
			Terminal{
				index,
				port,
				router_credits,
				stored_flits: VecDeque::new(),
				current_virtual_channel: None,
				consumed_flits: BTreeMap::new(),
				statistics: TerminalStatistics::default(),
			}
		}).collect();
		Simulation{
			configuration: cv.clone(),
			seed,
			warmup,
			measured,
			shared: SimulationShared{
				cycle: 0,
				network: Network{
					wiring,
					routers,
					terminals,
				},
				routing,
				link_classes,
				maximum_packet_size,
				general_frequency_divisor,
			},
			mutable: SimulationMut{
				rng,
				message_log: VecMessageLog::default(),
			},
			metadata_handler,
			event_queue: EventQueue::new(1000),
			transaction_count: 0,
			plugs,
		}
	}
	///Hand a message to a terminal for injection, all of whose packets will use the given
	///virtual channel to enter the first router. Returns the message for tracking.
	pub fn inject_message(&mut self, origin:usize, destination:usize, size:usize, virtual_channel:usize) -> Rc<Message>
	{
		if origin==destination
		{
			panic!("Terminal {} injecting a message to itself",origin);
		}
		let transaction = self.transaction_count;
		self.transaction_count += 1;
		let cycle = self.shared.cycle;
		let message = Rc::new(Message{
			origin,
			destination,
			source_address: vec![origin as u32],
			destination_address: vec![destination as u32],
			size,
			creation_cycle: cycle,
			transaction,
			traffic_class: 0,
			protocol_class: 0,
			op_code: 0,
		});
		self.mutable.message_log.start_transaction(transaction,cycle);
		let metadata = match self.metadata_handler
		{
			MetadataHandler::Zero => 0,
			MetadataHandler::CreationTimestamp => cycle,
		};
		let mut remaining = size;
		let mut packet_index = 0;
		while remaining>0
		{
			let packet_size = remaining.min(self.shared.maximum_packet_size);
			let packet = Rc::new(Packet{
				size: packet_size,
				message: message.clone(),
				index: packet_index,
				hop_count: RefCell::new(0),
				metadata: RefCell::new(metadata),
				routing_extension: RefCell::new(RoutingExtension::None),
				cycle_into_network: RefCell::new(0),
			});
			for index in 0..packet_size
			{
				self.shared.network.terminals[origin].stored_flits.push_back(Rc::new(Flit{
					packet: packet.clone(),
					index,
					virtual_channel: RefCell::new(if index==0 { Some(virtual_channel) } else { None }),
					send_cycle: RefCell::new(0),
					receive_cycle: RefCell::new(0),
				}));
			}
			remaining -= packet_size;
			packet_index += 1;
		}
		message
	}
	///Run the simulation until its time is exhausted.
	pub fn run(&mut self)
	{
		while self.shared.cycle < self.warmup+self.measured
		{
			self.advance();
			if self.shared.cycle==self.warmup
			{
				for router in self.shared.network.routers.iter()
				{
					router.borrow_mut().reset_statistics(self.shared.cycle);
				}
			}
		}
	}
	///Execute a single cycle of the simulation.
	pub fn advance(&mut self)
	{
		let cycle = self.shared.cycle;
		//first the events at the begin of the cycle: flit and credit arrivals
		let mut ievent = 0;
		loop
		{
			let event = if let Some(event) = self.event_queue.access_begin(ievent)
			{
				event.clone()
			}
			else
			{
				break;
			};
			match event
			{
				Event::FlitToLocation{ ref flit, ref previous, ref new } =>
				{
					match new
					{
						&Location::RouterPort{ router_index, router_port } =>
						{
							if flit.is_head()
							{
								if let &Location::TerminalPort(_) = previous
								{
									*flit.packet.cycle_into_network.borrow_mut() = cycle;
								}
							}
							let new_events =
							{
								let mut router = self.shared.network.routers[router_index].borrow_mut();
								router.insert(cycle,flit.clone(),router_port,&mut self.mutable.rng)
							};
							for new_event in new_events
							{
								self.event_queue.enqueue(new_event);
							}
						},
						&Location::TerminalPort(terminal_index) =>
						{
							self.shared.network.terminals[terminal_index].consume(flit.clone(),cycle,&mut self.mutable.message_log);
							//acknowledge the slot to the router driving this terminal link
							if let &Location::RouterPort{ router_index, router_port } = previous
							{
								let (_,link_class) = self.shared.network.wiring.neighbour(router_index,router_port);
								let link = &self.shared.link_classes[link_class];
								let virtual_channel = flit.virtual_channel.borrow().expect("delivered flit without virtual channel");
								let mut envelope = Credit::new(1);
								envelope.push(virtual_channel);
								let target = event::round_to_multiple(cycle+link.delay,link.frequency_divisor);
								self.event_queue.enqueue_begin(Event::CreditToLocation{
									location: Location::RouterPort{ router_index, router_port },
									credit: envelope,
								},target-cycle);
							}
							else
							{
								panic!("Flit reached terminal {} from {:?}",terminal_index,previous);
							}
						},
						&Location::None => panic!("Flit went nowhere, previous={:?}",previous),
					};
				},
				Event::CreditToLocation{ ref location, ref credit } =>
				{
					match location
					{
						&Location::RouterPort{ router_index, router_port } =>
						{
							let new_events =
							{
								let mut router = self.shared.network.routers[router_index].borrow_mut();
								router.acknowledge(cycle,router_port,credit.clone())
							};
							for new_event in new_events
							{
								self.event_queue.enqueue(new_event);
							}
						},
						&Location::TerminalPort(terminal_index) =>
						{
							let terminal = &mut self.shared.network.terminals[terminal_index];
							for &virtual_channel in credit.iter()
							{
								terminal.router_credits[virtual_channel] += 1;
							}
						},
						&Location::None => panic!("Credit went nowhere"),
					};
				},
				Event::Generic(ref element) =>
				{
					let new_events = element.borrow_mut().process(&self.shared,&mut self.mutable);
					for new_event in new_events
					{
						self.event_queue.enqueue(new_event);
					}
				},
			};
			ievent += 1;
		}
		//then the events at the end of the cycle: arbitration and movement decisions
		ievent = 0;
		loop
		{
			let event = if let Some(event) = self.event_queue.access_end(ievent)
			{
				event.clone()
			}
			else
			{
				break;
			};
			match event
			{
				Event::FlitToLocation{..} => panic!("Flits should not arrive at the end of a cycle"),
				Event::CreditToLocation{..} => panic!("Credits should not arrive at the end of a cycle"),
				Event::Generic(ref element) =>
				{
					let new_events = element.borrow_mut().process(&self.shared,&mut self.mutable);
					for new_event in new_events
					{
						self.event_queue.enqueue(new_event);
					}
				},
			};
			ievent += 1;
		}
		//finally the terminals put flits on their links
		let num_terminals = self.shared.network.terminals.len();
		for terminal_index in 0..num_terminals
		{
			let (location,link_class) = self.shared.network.terminals[terminal_index].port.clone();
			let link_delay;
			let link_period;
			{
				let link = &self.shared.link_classes[link_class];
				link_delay = link.delay;
				link_period = link.frequency_divisor;
			}
			if cycle%link_period != 0
			{
				continue;
			}
			let emitted = self.shared.network.terminals[terminal_index].try_emit(cycle);
			if let Some(flit) = emitted
			{
				let target = event::round_to_multiple(cycle+link_delay,link_period);
				self.event_queue.enqueue_begin(Event::FlitToLocation{
					flit,
					previous: Location::TerminalPort(terminal_index),
					new: location.clone(),
				},target-cycle);
			}
		}
		self.event_queue.advance();
		self.shared.cycle += 1;
	}
	///Fold the statistics of every router into a single record.
	pub fn aggregate_router_statistics(&self) -> Option<ConfigurationValue>
	{
		let total_routers = self.shared.network.routers.len();
		self.shared.network.routers.iter().enumerate().fold(None,|accumulated,(index,router)|{
			router.borrow().aggregate_statistics(accumulated,index,total_routers,self.shared.cycle)
		})
	}
}
