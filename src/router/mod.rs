/*!

A `Router` receives flits from its input channels, arbitrates them through its crossbar,
and forwards them to its output channels, returning credits upstream as its input buffers
drain.

see [`new_router`](fn.new_router.html) for documentation on the configuration syntax of predefined routers.

*/

pub mod input_queue;
pub mod output_queue;
pub mod input_output;
pub mod output_queued;

use std::rc::Rc;
use std::cell::RefCell;
use std::mem::size_of;

use ::rand::rngs::StdRng;

use crate::{Flit,LinkClass,Plugs};
use crate::config::ConfigurationValue;
use crate::event::{Eventful,EventGeneration,Time};
use crate::quantify::Quantifiable;

use input_output::InputOutputQueued;
use output_queued::OutputQueued;

///The credits returned upstream over one channel cycle, bundled into a single envelope.
///Each entry credits one flit slot of the named virtual channel; a virtual channel may
///appear several times.
#[derive(Clone,Debug)]
pub struct Credit
{
	virtual_channels: Vec<usize>,
	///How many entries the envelope may carry: one per flit the router can acknowledge in
	///a channel cycle.
	capacity: usize,
}

impl Credit
{
	pub fn new(capacity:usize) -> Credit
	{
		Credit{
			virtual_channels: vec![],
			capacity,
		}
	}
	pub fn push(&mut self, virtual_channel:usize)
	{
		if self.virtual_channels.len()>=self.capacity
		{
			panic!("Pushing a credit into a full envelope of capacity {}",self.capacity);
		}
		self.virtual_channels.push(virtual_channel);
	}
	pub fn len(&self) -> usize
	{
		self.virtual_channels.len()
	}
	pub fn is_empty(&self) -> bool
	{
		self.virtual_channels.is_empty()
	}
	pub fn iter(&self) -> std::slice::Iter<usize>
	{
		self.virtual_channels.iter()
	}
}

impl Quantifiable for Credit
{
	fn total_memory(&self) -> usize
	{
		size_of::<Credit>() + self.virtual_channels.total_memory()
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

///Which credit pools feed the congestion-status device of a router.
#[derive(Clone,Copy,PartialEq,Eq,Debug)]
pub enum CongestionMode
{
	///Occupancy of the router's own output queues.
	Output,
	///Occupancy of the input buffers of the neighbours.
	Downstream,
	///Both pools folded over the same indices.
	OutputAndDownstream,
}

impl CongestionMode
{
	pub fn parse(mode:&str) -> CongestionMode
	{
		match mode
		{
			"output" => CongestionMode::Output,
			"downstream" => CongestionMode::Downstream,
			"output_and_downstream" => CongestionMode::OutputAndDownstream,
			_ => panic!("invalid congestion mode: {}",mode),
		}
	}
}

///The interface that the simulation sees on every router.
pub trait Router: Eventful + Quantifiable
{
	///A flit has arrived by the given input port. To be called at the begin of the cycle.
	fn insert(&mut self, current_cycle:Time, flit:Rc<Flit>, port:usize, rng:&mut StdRng) -> Vec<EventGeneration>;
	///A credit envelope has arrived by the given output port.
	fn acknowledge(&mut self, current_cycle:Time, port:usize, credit:Credit) -> Vec<EventGeneration>;
	///Number of virtual channels per port.
	fn num_virtual_channels(&self) -> usize;
	///Capacity of the input buffer of a (port, virtual channel) pair.
	fn input_queue_size(&self, port:usize, virtual_channel:usize) -> usize;
	///The congestion estimate a routing algorithm reads to bias its choices, in [0,1].
	fn congestion_status(&self, input_port:usize, input_virtual_channel:usize, output_port:usize, output_virtual_channel:usize) -> f64;
	///All the flits currently inside the router. For memory accounting.
	fn iter_flits(&self) -> Box<dyn Iterator<Item=Rc<Flit>>>;
	///The index of the router in the network.
	fn get_index(&self) -> Option<usize>;
	///Fold this router's statistics over the already aggregated ones.
	fn aggregate_statistics(&self, statistics:Option<ConfigurationValue>, router_index:usize, total_routers:usize, cycle:Time) -> Option<ConfigurationValue>;
	///Restart the statistics, to be called at the end of the warmup.
	fn reset_statistics(&mut self, next_cycle:Time);
}

///Arguments for the router builder.
#[non_exhaustive]
pub struct RouterBuilderArgument<'a>
{
	///The index of the router being created in the network.
	pub router_index: usize,
	///A ConfigurationValue::Object defining the router.
	pub cv: &'a ConfigurationValue,
	///A reference to the Plugs object.
	pub plugs: &'a Plugs,
	///Number of ports of the router.
	pub num_ports: usize,
	///The link class of each port, to run output stages at the channel frequency and to
	///size the credit envelopes.
	pub port_link_class: &'a [usize],
	///The properties of each link class.
	pub link_classes: &'a [LinkClass],
	///The maximum packet size the terminals generate. For buffer checks.
	pub maximum_packet_size: usize,
	///The frequency divisor of the router clock.
	pub general_frequency_divisor: Time,
	///The random number generator.
	pub rng: &'a mut StdRng,
}

/**
Build a router. The available variants are

`InputOutputQueued`, the reference input-output-queued router: per (port, virtual channel)
input buffers drive a route-evaluation / virtual-channel-allocation / switch-allocation
pipeline onto a central crossbar, with bounded output queues serializing onto the channels.
See [input_output](input_output/index.html).

`OutputQueued`, a purely output-queued router: whole packets cross the switch after a
configurable latency into unbounded output queues. See [output_queued](output_queued/index.html).
**/
pub fn new_router(arg:RouterBuilderArgument) -> Rc<RefCell<dyn Router>>
{
	if let &ConfigurationValue::Object(ref cv_name, ref _cv_pairs) = arg.cv
	{
		if let Some(builder) = arg.plugs.routers.get(cv_name)
		{
			return builder(arg);
		}
		match cv_name.as_ref()
		{
			"InputOutputQueued" => InputOutputQueued::new(arg),
			"OutputQueued" => OutputQueued::new(arg),
			_ => panic!("Unknown router: {}",cv_name),
		}
	}
	else
	{
		panic!("Trying to create a Router from a non-Object");
	}
}
