
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc,Weak};
use std::mem::size_of;

use ::rand::{Rng,rngs::StdRng};

use super::{Router,RouterBuilderArgument,Credit,CongestionMode};
use super::output_queue::OutputQueue;
use super::input_queue::PipelineState;
use crate::{Flit,Packet,Location};
use crate::config::ConfigurationValue;
use crate::congestion::{CongestionStatus,CongestionStatusBuilderArgument,CongestionStyle};
use crate::event::{self,Event,Eventful,EventGeneration,CyclePosition,Time};
use crate::quantify::Quantifiable;
use crate::routing::{Routing,RoutingRequest};
use crate::scheduler::CreditWatcher;
use crate::scheduler::crossbar::{CrossbarScheduler,CrossbarSchedulerBuilderArgument};
use crate::{SimulationShared,SimulationMut};
use crate::match_object_panic;

/**
A purely output-queued router.

Input buffers only evaluate routes: once a head flit knows its egress, the router waits for
the whole packet to be buffered and transfers it at once across the switch, taking
`transfer_latency` router cycles, into the unbounded output queue of the chosen
(port, virtual channel). The output queues serialize onto the channels through per-port
single-port crossbar schedulers, exactly as in the input-output-queued router.

Since the output queues are unbounded, congestion modes looking at them require the
congestion device to run in the absolute style; relative occupancy would always be zero.

```ignore
OutputQueued{
	virtual_channels: 2,
	input_queue_depth: 8,
	transfer_latency: 1,
	output_crossbar_scheduler: CrossbarScheduler{ full_packet:false, packet_lock:false, idle_unlock:false, allocator: Islip{...} },
	congestion_mode: "output",
	congestion_status: CongestionStatus{ style:"absolute", absolute_window:32 },
}
```
**/
pub struct OutputQueued
{
	///Weak pointer to itself, see <https://users.rust-lang.org/t/making-a-rc-refcell-trait2-from-rc-refcell-trait1/16086/3>
	self_rc: Weak<RefCell<OutputQueued>>,
	///When is the next scheduled event. Stack with the sooner event the last.
	next_events: Vec<Time>,
	///The cycle number of the last time process was called. Only for debugging/assertion purposes.
	last_process_at_cycle: Option<Time>,
	router_index: usize,
	num_ports: usize,
	num_virtual_channels: usize,
	input_queue_depth: usize,
	///Router cycles a whole packet takes to cross the switch.
	transfer_latency: Time,
	frequency_divisor: Time,
	port_link_class: Vec<usize>,
	port_channel_period: Vec<Time>,
	///The route-and-transfer queues, indexed as `port*num_virtual_channels+virtual_channel`.
	transfer_queues: Vec<TransferQueue>,
	///The unbounded output queues, indexed likewise.
	output_queues: Vec<OutputQueue>,
	output_crossbar_schedulers: Vec<CrossbarScheduler>,
	congestion_status: Rc<RefCell<CongestionStatus>>,
	congestion_mode: CongestionMode,
	output_stages: Vec<Rc<RefCell<internal::OutputStage>>>,
	expected_arrival: Vec<Option<Time>>,
	expected_packet: Vec<Option<Rc<Packet>>>,
	port_virtual_channel: Vec<Option<usize>>,
	credits_to_send: Vec<Vec<usize>>,
	credit_envelope_size: Vec<usize>,

	//statistics:
	statistics_begin_cycle: Time,
	statistics_packets_arrived: usize,
	statistics_packets_departed: usize,
	statistics_input_occupation_per_vc: Vec<f64>,
	statistics_output_occupation_per_vc: Vec<f64>,
}

///What evaluating a transfer queue reports back to the router.
#[derive(Default)]
struct TransferOutcome
{
	///A whole packet ready to cross the switch, with its chosen egress.
	pulled: Option<(Vec<Rc<Flit>>,usize,usize)>,
	///Flits freed from the buffer, owing that many credits upstream.
	credits_returned: usize,
	active: bool,
}

///The input side of an output-queued router: a bounded buffer whose only pipeline stage
///evaluates the route of each head flit and then holds it until the whole packet can be
///pulled across the switch.
struct TransferQueue
{
	name: String,
	port: usize,
	virtual_channel: usize,
	depth: usize,
	buffer: VecDeque<Rc<Flit>>,
	last_received_cycle: Option<Time>,
	state: PipelineState,
	head: Option<Rc<Flit>>,
	///The egress chosen for the packet being transferred.
	chosen: Option<(usize,usize)>,
}

impl TransferQueue
{
	fn new(name:String, port:usize, virtual_channel:usize, depth:usize) -> TransferQueue
	{
		if depth==0
		{
			panic!("{}: input queues must have some capacity",name);
		}
		TransferQueue{
			name,
			port,
			virtual_channel,
			depth,
			buffer: VecDeque::new(),
			last_received_cycle: None,
			state: PipelineState::Empty,
			head: None,
			chosen: None,
		}
	}
	fn occupation(&self) -> usize
	{
		self.buffer.len()
	}
	fn is_idle(&self) -> bool
	{
		self.buffer.is_empty() && self.state==PipelineState::Empty
	}
	fn iter_flits(&self) -> impl Iterator<Item=Rc<Flit>> + '_
	{
		self.buffer.iter().cloned().chain(self.head.iter().cloned())
	}
	fn receive_flit(&mut self, cycle:Time, flit:Rc<Flit>)
	{
		if let Some(last) = self.last_received_cycle
		{
			if last>=cycle
			{
				panic!("{}: receiving two flits in cycle {}",self.name,cycle);
			}
		}
		self.last_received_cycle = Some(cycle);
		self.buffer.push_back(flit);
		if self.buffer.len()>self.depth
		{
			panic!("{}: buffer overflow beyond depth {}",self.name,self.depth);
		}
	}
	fn evaluate(&mut self, router_index:usize, num_virtual_channels:usize, routing:&dyn Routing, rng:&mut StdRng) -> TransferOutcome
	{
		let mut outcome = TransferOutcome::default();
		//pull the packet once every flit of it is buffered
		if self.state==PipelineState::WaitingForTransfer
		{
			let packet_size = self.head.as_ref().expect("transfer stage without a head").packet.size;
			if self.buffer.len()+1>=packet_size
			{
				let head = self.head.take().expect("transfer stage without a head");
				let packet = head.packet.clone();
				let mut flits = Vec::with_capacity(packet_size);
				flits.push(head);
				for _ in 1..packet_size
				{
					let flit = self.buffer.pop_front().expect("There are no flits");
					if !Rc::ptr_eq(&flit.packet,&packet)
					{
						panic!("{}: a flit of another packet interleaved in the buffer",self.name);
					}
					outcome.credits_returned += 1;
					flits.push(flit);
				}
				let (out_port,out_virtual_channel) = self.chosen.take().expect("transfer stage without an egress");
				outcome.pulled = Some((flits,out_port,out_virtual_channel));
				self.state = PipelineState::Empty;
			}
		}
		//load the next head
		if self.state==PipelineState::Empty && !self.buffer.is_empty()
		{
			let flit = self.buffer.pop_front().expect("There are no flits");
			if !flit.is_head()
			{
				panic!("{}: the transfer stage can only load head flits",self.name);
			}
			outcome.credits_returned += 1;
			self.head = Some(flit);
			self.state = PipelineState::WaitingToRequest;
		}
		//evaluate the route
		if self.state==PipelineState::WaitingToRequest
		{
			let head = self.head.as_ref().expect("transfer stage requesting without a head");
			let request = RoutingRequest{
				packet: &head.packet,
				router_index,
				entry_port: self.port,
				entry_virtual_channel: self.virtual_channel,
				num_virtual_channels,
			};
			let response = routing.next(&request,rng).unwrap_or_else(|e|panic!("{}: error {} while routing",self.name,e));
			if response.is_empty()
			{
				if response.idempotent
				{
					panic!("{}: there are no routes for packet {:?} towards terminal {}",self.name,head.packet,head.packet.message.destination);
				}
				//retry on a later cycle
			}
			else
			{
				//the whole packet follows one egress, chosen uniformly here
				let candidate = &response.candidates[rng.gen_range(0..response.candidates.len())];
				self.chosen = Some((candidate.port,candidate.virtual_channel));
				routing.vc_scheduled(head,candidate.port,candidate.virtual_channel);
				self.state = PipelineState::WaitingForTransfer;
			}
		}
		outcome.active = !self.is_idle();
		outcome
	}
}

impl OutputQueued
{
	pub fn new(arg:RouterBuilderArgument) -> Rc<RefCell<OutputQueued>>
	{
		let RouterBuilderArgument{
			router_index,
			cv,
			plugs,
			num_ports,
			port_link_class,
			link_classes,
			maximum_packet_size,
			general_frequency_divisor,
			rng,
			..
		} = arg;
		let mut virtual_channels = None;
		let mut input_queue_depth = None;
		let mut transfer_latency : Option<Time> = None;
		let mut frequency_divisor = general_frequency_divisor;
		let mut output_crossbar_scheduler_cv = None;
		let mut congestion_mode = None;
		let mut congestion_status_cv = None;
		match_object_panic!(cv,"OutputQueued",value,
			"virtual_channels" => virtual_channels = Some(value.as_usize().expect("bad value for virtual_channels")),
			"input_queue_depth" => input_queue_depth = Some(value.as_usize().expect("bad value for input_queue_depth")),
			"transfer_latency" => transfer_latency = Some(value.as_time().expect("bad value for transfer_latency")),
			"frequency_divisor" => frequency_divisor = value.as_time().expect("bad value for frequency_divisor"),
			"output_crossbar_scheduler" => output_crossbar_scheduler_cv = Some(value.clone()),
			"congestion_mode" => congestion_mode = Some(CongestionMode::parse(value.as_str().expect("bad value for congestion_mode"))),
			"congestion_status" => congestion_status_cv = Some(value.clone()),
		);
		let virtual_channels = virtual_channels.expect("There were no virtual_channels");
		let input_queue_depth = input_queue_depth.expect("There were no input_queue_depth");
		if input_queue_depth<maximum_packet_size
		{
			//the whole packet must fit in the input buffer before crossing the switch
			panic!("Router{}: input_queue_depth {} cannot hold packets of up to {} flits",router_index,input_queue_depth,maximum_packet_size);
		}
		let transfer_latency = transfer_latency.expect("There were no transfer_latency");
		if transfer_latency==0
		{
			panic!("Router{}: transfer_latency must be nonzero",router_index);
		}
		let output_crossbar_scheduler_cv = output_crossbar_scheduler_cv.expect("There were no output_crossbar_scheduler");
		let congestion_mode = congestion_mode.expect("There were no congestion_mode");
		let congestion_status_cv = congestion_status_cv.expect("There were no congestion_status");
		if num_ports==0 || virtual_channels==0
		{
			panic!("Router{}: ports and virtual channels must be nonzero",router_index);
		}
		if port_link_class.len()!=num_ports
		{
			panic!("Router{}: {} ports but {} link classes",router_index,num_ports,port_link_class.len());
		}
		let total_vcs = num_ports*virtual_channels;
		let transfer_queues = (0..total_vcs).map(|index|TransferQueue::new(
			format!("Router{}.InputQueue_{}_{}",router_index,index/virtual_channels,index%virtual_channels),
			index/virtual_channels,
			index%virtual_channels,
			input_queue_depth,
		)).collect();
		let output_queues = (0..total_vcs).map(|index|OutputQueue::new(
			format!("Router{}.OutputQueue_{}_{}",router_index,index/virtual_channels,index%virtual_channels),
			index%virtual_channels,
			0,//unbounded
		)).collect();
		let mut output_crossbar_schedulers : Vec<CrossbarScheduler> = (0..num_ports).map(|port|CrossbarScheduler::new(CrossbarSchedulerBuilderArgument{
			cv:&output_crossbar_scheduler_cv,
			name:format!("Router{}.OutputCrossbarScheduler_{}",router_index,port),
			num_clients:virtual_channels,
			total_vcs:virtual_channels,
			crossbar_ports:1,
			global_vc_offset:port*virtual_channels,
			plugs,
			rng:&mut *rng,
		})).collect();
		let congestion_status = Rc::new(RefCell::new(CongestionStatus::new(CongestionStatusBuilderArgument{
			cv:&congestion_status_cv,
			name:format!("Router{}.CongestionStatus",router_index),
			total_vcs,
		})));
		if congestion_mode==CongestionMode::Output || congestion_mode==CongestionMode::OutputAndDownstream
		{
			//the output queues are unbounded; relative occupancy over them would always be zero
			if congestion_status.borrow().style()!=CongestionStyle::Absolute
			{
				panic!("Router{}: congestion mode over unbounded output queues requires the absolute style",router_index);
			}
			let mut device = congestion_status.borrow_mut();
			for vc_index in 0..total_vcs
			{
				device.init_credits(vc_index,None);
			}
		}
		if congestion_mode==CongestionMode::Downstream || congestion_mode==CongestionMode::OutputAndDownstream
		{
			for scheduler in output_crossbar_schedulers.iter_mut()
			{
				scheduler.add_credit_watcher(congestion_status.clone());
			}
		}
		for scheduler in output_crossbar_schedulers.iter_mut()
		{
			for virtual_channel in 0..virtual_channels
			{
				scheduler.init_credit_count(virtual_channel,input_queue_depth);
			}
		}
		let port_channel_period : Vec<Time> = port_link_class.iter().map(|&link_class|link_classes[link_class].frequency_divisor).collect();
		//pulling a packet across the switch frees its whole footprint at once, so an
		//envelope must be able to acknowledge a full input buffer
		let credit_envelope_size = vec![ input_queue_depth*virtual_channels ; num_ports ];
		let r = Rc::new(RefCell::new(OutputQueued{
			self_rc: Weak::new(),
			next_events: vec![],
			last_process_at_cycle: None,
			router_index,
			num_ports,
			num_virtual_channels: virtual_channels,
			input_queue_depth,
			transfer_latency,
			frequency_divisor,
			port_link_class: port_link_class.to_vec(),
			port_channel_period,
			transfer_queues,
			output_queues,
			output_crossbar_schedulers,
			congestion_status,
			congestion_mode,
			output_stages: vec![],
			expected_arrival: vec![None;num_ports],
			expected_packet: vec![None;num_ports],
			port_virtual_channel: vec![None;num_ports],
			credits_to_send: vec![vec![];num_ports],
			credit_envelope_size,
			statistics_begin_cycle: 0,
			statistics_packets_arrived: 0,
			statistics_packets_departed: 0,
			statistics_input_occupation_per_vc: vec![0f64;virtual_channels],
			statistics_output_occupation_per_vc: vec![0f64;virtual_channels],
		}));
		r.borrow_mut().self_rc = Rc::<_>::downgrade(&r);
		r
	}
	///The end of a packet transfer across the switch: every flit of the packet lands in
	///its output queue at once.
	fn receive_packet(&mut self, cycle:Time, out_index:usize, flits:Vec<Rc<Flit>>) -> Vec<EventGeneration>
	{
		self.output_queues[out_index].receive_packet(cycle,flits);
		let port = out_index/self.num_virtual_channels;
		if !self.output_stages.is_empty()
		{
			if let Some(event) = self.output_stages[port].borrow_mut().schedule(cycle,0)
			{
				return vec![event];
			}
		}
		vec![]
	}
}

impl Router for OutputQueued
{
	fn insert(&mut self, current_cycle:Time, flit:Rc<Flit>, port:usize, _rng:&mut StdRng) -> Vec<EventGeneration>
	{
		if flit.is_head()
		{
			if self.expected_packet[port].is_some()
			{
				panic!("Router{}: a second packet interleaved into port {} mid-packet",self.router_index,port);
			}
		}
		else
		{
			match self.expected_arrival[port]
			{
				Some(expected) if expected==current_cycle => (),
				_ => panic!("Router{}: flit of port {} arrived at {} instead of {:?}",self.router_index,port,current_cycle,self.expected_arrival[port]),
			}
			match self.expected_packet[port]
			{
				Some(ref expected) if Rc::ptr_eq(expected,&flit.packet) => (),
				_ => panic!("Router{}: port {} received a flit of a packet it was not receiving",self.router_index,port),
			}
		}
		let virtual_channel = if flit.is_head()
		{
			let virtual_channel = flit.virtual_channel.borrow().expect("head flit without virtual channel");
			self.port_virtual_channel[port] = Some(virtual_channel);
			virtual_channel
		}
		else
		{
			let virtual_channel = self.port_virtual_channel[port].expect("body flit on a port without a latched virtual channel");
			*flit.virtual_channel.borrow_mut() = Some(virtual_channel);
			virtual_channel
		};
		if flit.is_tail()
		{
			self.expected_arrival[port] = None;
			self.expected_packet[port] = None;
		}
		else
		{
			self.expected_arrival[port] = Some(current_cycle + self.port_channel_period[port]);
			self.expected_packet[port] = Some(flit.packet.clone());
		}
		if flit.is_head()
		{
			*flit.packet.hop_count.borrow_mut() += 1;
			self.statistics_packets_arrived += 1;
		}
		let index = port*self.num_virtual_channels + virtual_channel;
		self.transfer_queues[index].receive_flit(current_cycle,flit);
		if let Some(event) = self.schedule(current_cycle,0)
		{
			vec![event]
		}
		else
		{
			vec![]
		}
	}
	fn acknowledge(&mut self, current_cycle:Time, port:usize, credit:Credit) -> Vec<EventGeneration>
	{
		for &virtual_channel in credit.iter()
		{
			self.output_crossbar_schedulers[port].increment_credit_count(virtual_channel);
		}
		let mut events = vec![];
		if !self.output_stages.is_empty()
		{
			if let Some(event) = self.output_stages[port].borrow_mut().schedule(current_cycle,0)
			{
				events.push(event);
			}
		}
		events
	}
	fn num_virtual_channels(&self) -> usize
	{
		self.num_virtual_channels
	}
	fn input_queue_size(&self, _port:usize, _virtual_channel:usize) -> usize
	{
		self.input_queue_depth
	}
	fn congestion_status(&self, _input_port:usize, _input_virtual_channel:usize, output_port:usize, output_virtual_channel:usize) -> f64
	{
		self.congestion_status.borrow().status(output_port*self.num_virtual_channels+output_virtual_channel)
	}
	fn iter_flits(&self) -> Box<dyn Iterator<Item=Rc<Flit>>>
	{
		let flits : Vec<Rc<Flit>> = self.transfer_queues.iter().flat_map(|queue|queue.iter_flits())
			.chain(self.output_queues.iter().flat_map(|queue|queue.iter_flits()))
			.collect();
		Box::new(flits.into_iter())
	}
	fn get_index(&self) -> Option<usize>
	{
		Some(self.router_index)
	}
	fn aggregate_statistics(&self, statistics:Option<ConfigurationValue>, router_index:usize, total_routers:usize, cycle:Time) -> Option<ConfigurationValue>
	{
		let cycle_span = cycle - self.statistics_begin_cycle;
		let mut input_occupation : Vec<f64> = self.statistics_input_occupation_per_vc.iter().map(|x|x/cycle_span as f64).collect();
		let mut output_occupation : Vec<f64> = self.statistics_output_occupation_per_vc.iter().map(|x|x/cycle_span as f64).collect();
		let mut packets_arrived = self.statistics_packets_arrived as f64;
		let mut packets_departed = self.statistics_packets_departed as f64;
		if let Some(previous) = statistics
		{
			if let ConfigurationValue::Object(cv_name,previous_pairs) = previous
			{
				if cv_name!="OutputQueued"
				{
					panic!("incompatible statistics, should be `OutputQueued` object not `{}`",cv_name);
				}
				for (name,value) in previous_pairs
				{
					match name.as_ref()
					{
						"average_input_occupation_per_vc" => for (accumulated,previous_value) in input_occupation.iter_mut().zip(value.as_array().expect("bad value for average_input_occupation_per_vc").iter())
						{
							*accumulated += previous_value.as_f64().expect("bad value in average_input_occupation_per_vc");
						},
						"average_output_occupation_per_vc" => for (accumulated,previous_value) in output_occupation.iter_mut().zip(value.as_array().expect("bad value for average_output_occupation_per_vc").iter())
						{
							*accumulated += previous_value.as_f64().expect("bad value in average_output_occupation_per_vc");
						},
						"packets_arrived" => packets_arrived += value.as_f64().expect("bad value for packets_arrived"),
						"packets_departed" => packets_departed += value.as_f64().expect("bad value for packets_departed"),
						_ => panic!("Nothing to do with field {} in OutputQueued statistics",name),
					}
				}
			}
			else
			{
				panic!("received incompatible statistics");
			}
		}
		let is_last = router_index+1==total_routers;
		if is_last
		{
			let factor = 1f64/total_routers as f64;
			for x in input_occupation.iter_mut()
			{
				*x *= factor;
			}
			for x in output_occupation.iter_mut()
			{
				*x *= factor;
			}
		}
		Some(ConfigurationValue::Object(String::from("OutputQueued"),vec![
			(String::from("average_input_occupation_per_vc"),ConfigurationValue::Array(input_occupation.iter().map(|&x|ConfigurationValue::Number(x)).collect())),
			(String::from("average_output_occupation_per_vc"),ConfigurationValue::Array(output_occupation.iter().map(|&x|ConfigurationValue::Number(x)).collect())),
			(String::from("packets_arrived"),ConfigurationValue::Number(packets_arrived)),
			(String::from("packets_departed"),ConfigurationValue::Number(packets_departed)),
		]))
	}
	fn reset_statistics(&mut self, next_cycle:Time)
	{
		self.statistics_begin_cycle = next_cycle;
		self.statistics_packets_arrived = 0;
		self.statistics_packets_departed = 0;
		for x in self.statistics_input_occupation_per_vc.iter_mut()
		{
			*x = 0f64;
		}
		for x in self.statistics_output_occupation_per_vc.iter_mut()
		{
			*x = 0f64;
		}
	}
}

impl Eventful for OutputQueued
{
	fn process(&mut self, simulation:&SimulationShared, mutable:&mut SimulationMut) -> Vec<EventGeneration>
	{
		if self.output_stages.is_empty()
		{
			self.output_stages = (0..self.num_ports).map(|port|{
				let link = simulation.link_classes[self.port_link_class[port]].clone();
				internal::OutputStageArgument{
					router: self,
					port,
					link,
				}.into()
			}).collect();
		}
		let mut cycles_span = 1;
		if let Some(last) = self.last_process_at_cycle
		{
			cycles_span = simulation.cycle - last;
			if last>=simulation.cycle
			{
				panic!("Trying to process at cycle {} a router::OutputQueued already processed at {}",simulation.cycle,last);
			}
		}
		self.last_process_at_cycle = Some(simulation.cycle);
		assert!(simulation.cycle%self.frequency_divisor==0,"Processing OutputQueued router at a cycle ({}) not multiple of its frequency_divisor ({})",simulation.cycle,self.frequency_divisor);
		for (index,queue) in self.transfer_queues.iter().enumerate()
		{
			self.statistics_input_occupation_per_vc[index%self.num_virtual_channels] += (queue.occupation()*cycles_span as usize) as f64/self.num_ports as f64;
		}
		for (index,queue) in self.output_queues.iter().enumerate()
		{
			self.statistics_output_occupation_per_vc[index%self.num_virtual_channels] += (queue.occupation()*cycles_span as usize) as f64/self.num_ports as f64;
		}
		let mut events = vec![];
		let mut recheck = false;
		{
			let OutputQueued{
				ref self_rc,
				ref mut transfer_queues,
				ref mut credits_to_send,
				ref congestion_status,
				congestion_mode,
				num_virtual_channels,
				router_index,
				transfer_latency,
				..
			} = *self;
			for index in 0..transfer_queues.len()
			{
				let outcome = transfer_queues[index].evaluate(router_index,num_virtual_channels,simulation.routing.as_ref(),&mut mutable.rng);
				if let Some((flits,out_port,out_virtual_channel)) = outcome.pulled
				{
					let out_index = out_port*num_virtual_channels+out_virtual_channel;
					for flit in flits.iter()
					{
						*flit.virtual_channel.borrow_mut() = Some(out_virtual_channel);
						if congestion_mode==CongestionMode::Output || congestion_mode==CongestionMode::OutputAndDownstream
						{
							congestion_status.borrow_mut().decrement_credit(out_index);
						}
					}
					let event = Rc::<RefCell<internal::PacketToOutput>>::from(internal::PacketToOutputArgument{
						router: self_rc.upgrade().expect("missing router"),
						out_index,
						flits,
					});
					events.push(EventGeneration{
						delay: transfer_latency,
						position: CyclePosition::Begin,
						event: Event::Generic(event),
					});
				}
				for _ in 0..outcome.credits_returned
				{
					credits_to_send[index/num_virtual_channels].push(index%num_virtual_channels);
				}
				recheck = recheck || outcome.active;
			}
		}
		for port in 0..self.num_ports
		{
			if self.credits_to_send[port].is_empty()
			{
				continue;
			}
			let mut envelope = Credit::new(self.credit_envelope_size[port]);
			for virtual_channel in self.credits_to_send[port].drain(..)
			{
				envelope.push(virtual_channel);
			}
			let (location,link_class) = simulation.network.wiring.neighbour(self.router_index,port);
			if let Location::None = location
			{
				panic!("Router{}: credits owed through the disconnected port {}",self.router_index,port);
			}
			let event = Event::CreditToLocation{
				location,
				credit: envelope,
			};
			events.push(simulation.schedule_link_arrival(link_class,event));
		}
		self.next_events.pop();
		if recheck
		{
			let next_delay = event::round_to_multiple(simulation.cycle+1,self.frequency_divisor)-simulation.cycle;
			if let Some(event) = self.schedule(simulation.cycle,next_delay)
			{
				events.push(event);
			}
		}
		events
	}
	fn as_eventful(&self) -> Weak<RefCell<dyn Eventful>>
	{
		self.self_rc.clone()
	}
	fn schedule(&mut self, current_cycle:Time, delay:Time) -> Option<EventGeneration>
	{
		let target = current_cycle+delay;
		let target = event::round_to_multiple(target,self.frequency_divisor);
		if self.next_events.is_empty() || target<*self.next_events.last().unwrap()
		{
			self.next_events.push(target);
			let event = Event::Generic(self.as_eventful().upgrade().expect("missing component"));
			Some(EventGeneration{
				delay: target-current_cycle,
				position: CyclePosition::End,
				event,
			})
		}
		else
		{
			None
		}
	}
}

impl Quantifiable for OutputQueued
{
	fn total_memory(&self) -> usize
	{
		size_of::<OutputQueued>()
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

/// Some things private to OutputQueued we want to have clearly separated.
mod internal
{
	use super::*;
	use crate::LinkClass;

	/**
	Deliver a whole packet into its output queue once the transfer latency has elapsed.
	**/
	pub struct PacketToOutput
	{
		self_rc: Weak<RefCell<PacketToOutput>>,
		router: Rc<RefCell<OutputQueued>>,
		out_index: usize,
		flits: Vec<Rc<Flit>>,
	}
	pub struct PacketToOutputArgument
	{
		pub router: Rc<RefCell<OutputQueued>>,
		pub out_index: usize,
		pub flits: Vec<Rc<Flit>>,
	}
	impl From<PacketToOutputArgument> for Rc<RefCell<PacketToOutput>>
	{
		fn from(arg:PacketToOutputArgument) -> Rc<RefCell<PacketToOutput>>
		{
			let event = Rc::new(RefCell::new(PacketToOutput{
				self_rc: Weak::new(),
				router: arg.router,
				out_index: arg.out_index,
				flits: arg.flits,
			}));
			event.borrow_mut().self_rc = Rc::<_>::downgrade(&event);
			event
		}
	}
	impl Eventful for PacketToOutput
	{
		fn process(&mut self, simulation:&SimulationShared, _mutable:&mut SimulationMut) -> Vec<EventGeneration>
		{
			let mut router = self.router.borrow_mut();
			let flits = std::mem::take(&mut self.flits);
			router.receive_packet(simulation.cycle,self.out_index,flits)
		}
		fn as_eventful(&self) -> Weak<RefCell<dyn Eventful>>
		{
			self.self_rc.clone()
		}
	}

	/**
	Process an output port at the channel frequency, as in the input-output-queued router.
	The only difference is the congestion bookkeeping over the unbounded queues.
	**/
	pub struct OutputStage
	{
		self_rc: Weak<RefCell<OutputStage>>,
		router: Rc<RefCell<OutputQueued>>,
		port: usize,
		link: LinkClass,
		num_virtual_channels: usize,
		pending_event: bool,
		///Guards against being woken twice within one channel cycle, which would resolve
		///scheduler requests on the cycle they were made.
		last_process_at_cycle: Option<Time>,
	}
	pub struct OutputStageArgument<'a>
	{
		pub router: &'a mut OutputQueued,
		pub port: usize,
		pub link: LinkClass,
	}
	impl<'a> From<OutputStageArgument<'a>> for Rc<RefCell<OutputStage>>
	{
		fn from(arg:OutputStageArgument) -> Rc<RefCell<OutputStage>>
		{
			let num_virtual_channels = arg.router.num_virtual_channels;
			let this = Rc::new(RefCell::new(OutputStage{
				self_rc: Weak::new(),
				router: arg.router.self_rc.upgrade().unwrap(),
				port: arg.port,
				link: arg.link,
				num_virtual_channels,
				pending_event: false,
				last_process_at_cycle: None,
			}));
			this.borrow_mut().self_rc = Rc::<_>::downgrade(&this);
			this
		}
	}
	impl Eventful for OutputStage
	{
		fn process(&mut self, simulation:&SimulationShared, mutable:&mut SimulationMut) -> Vec<EventGeneration>
		{
			if self.last_process_at_cycle==Some(simulation.cycle)
			{
				//woken a second time within the cycle; take the work up on the next one
				self.pending_event = false;
				return match self.schedule(simulation.cycle,1)
				{
					Some(event) => vec![event],
					None => vec![],
				};
			}
			self.last_process_at_cycle = Some(simulation.cycle);
			let mut events = vec![];
			let mut router = self.router.borrow_mut();
			let port = self.port;
			assert!(simulation.cycle%self.link.frequency_divisor==0,"Processing an output stage at a cycle ({}) not multiple of its channel period ({})",simulation.cycle,self.link.frequency_divisor);
			let responses = router.output_crossbar_schedulers[port].execute_cycle(&mut mutable.rng);
			for response in responses
			{
				let index = port*self.num_virtual_channels + response.client;
				router.output_queues[index].scheduler_response(response.port.is_some());
			}
			let mut active = false;
			for virtual_channel in 0..self.num_virtual_channels
			{
				let index = port*self.num_virtual_channels + virtual_channel;
				let outcome = {
					let router = &mut *router;
					router.output_queues[index].evaluate(simulation.cycle,&mut router.output_crossbar_schedulers[port])
				};
				if let Some(flit) = outcome.emitted
				{
					if router.congestion_mode==CongestionMode::Output || router.congestion_mode==CongestionMode::OutputAndDownstream
					{
						//the flit leaves the unbounded pool
						router.congestion_status.borrow_mut().increment_credit(index);
					}
					if flit.is_head()
					{
						router.statistics_packets_departed += 1;
					}
					let (new_location,_link_class) = simulation.network.wiring.neighbour(router.router_index,port);
					events.push(EventGeneration{
						delay: self.link.delay,
						position: CyclePosition::Begin,
						event: Event::FlitToLocation{
							flit,
							previous: Location::RouterPort{
								router_index: router.router_index,
								router_port: port,
							},
							new: new_location,
						},
					});
				}
				active = active || outcome.active;
			}
			drop(router);
			self.pending_event = false;
			if active
			{
				if let Some(event) = self.schedule(simulation.cycle,1)
				{
					events.push(event);
				}
			}
			events
		}
		fn as_eventful(&self) -> Weak<RefCell<dyn Eventful>>
		{
			self.self_rc.clone()
		}
		fn schedule(&mut self, current_cycle:Time, delay:Time) -> Option<EventGeneration>
		{
			if !self.pending_event
			{
				self.pending_event = true;
				let event = Event::Generic(self.as_eventful().upgrade().expect("missing component"));
				let target = event::round_to_multiple(current_cycle+delay,self.link.frequency_divisor);
				Some(EventGeneration{
					delay: target-current_cycle,
					position: CyclePosition::End,
					event,
				})
			}
			else
			{
				None
			}
		}
	}
}
