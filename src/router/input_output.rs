
use std::cell::RefCell;
use std::rc::{Rc,Weak};
use std::mem::size_of;

use ::rand::rngs::StdRng;

use super::{Router,RouterBuilderArgument,Credit,CongestionMode};
use super::input_queue::{InputQueue,PipelineContext};
use super::output_queue::OutputQueue;
use crate::{Flit,Packet,Location};
use crate::config::ConfigurationValue;
use crate::congestion::{CongestionStatus,CongestionStatusBuilderArgument};
use crate::event::{self,Event,Eventful,EventGeneration,CyclePosition,Time};
use crate::quantify::Quantifiable;
use crate::scheduler::crossbar::{CrossbarScheduler,CrossbarSchedulerBuilderArgument};
use crate::scheduler::virtual_channel::{VcScheduler,VcSchedulerBuilderArgument};
use crate::{SimulationShared,SimulationMut};
use crate::match_object_panic;

/**
The reference input-output-queued router.

Every (port, virtual channel) pair owns an input queue whose three-stage pipeline asks the
routing algorithm, acquires a downstream virtual channel through the
[VcScheduler](../../scheduler/virtual_channel/struct.VcScheduler.html), and wins the main
crossbar through the central
[CrossbarScheduler](../../scheduler/crossbar/struct.CrossbarScheduler.html), whose credits
mirror the space of the bounded output queues. Each output port serializes its queues onto
the channel through its own single-port crossbar scheduler running at the channel
frequency, whose credits mirror the input buffers of the neighbour.

```ignore
InputOutputQueued{
	virtual_channels: 2,
	input_queue_depth: 8,
	output_queue_depth: 8,
	vca_swa_wait: false,
	crossbar_delay: 0,
	vc_scheduler: VcScheduler{ allocator: RcSeparable{...} },
	crossbar_scheduler: CrossbarScheduler{ full_packet:false, packet_lock:false, idle_unlock:false, allocator: Islip{...} },
	output_crossbar_scheduler: CrossbarScheduler{...},
	congestion_mode: "downstream",
	congestion_status: CongestionStatus{ style:"relative" },
}
```
**/
pub struct InputOutputQueued
{
	///Weak pointer to itself, see <https://users.rust-lang.org/t/making-a-rc-refcell-trait2-from-rc-refcell-trait1/16086/3>
	self_rc: Weak<RefCell<InputOutputQueued>>,
	///When is the next scheduled event. Stack with the sooner event the last.
	next_events: Vec<Time>,
	///The cycle number of the last time process was called. Only for debugging/assertion purposes.
	last_process_at_cycle: Option<Time>,
	///Its index in the network.
	router_index: usize,
	num_ports: usize,
	num_virtual_channels: usize,
	input_queue_depth: usize,
	#[allow(dead_code)]
	output_queue_depth: usize,
	///Cycles a flit takes to traverse the crossbar into its output queue. In pipeline.
	crossbar_delay: Time,
	///Divisor of the cycles in which the crossbar operates.
	crossbar_frequency_divisor: Time,
	///The link class of each port.
	port_link_class: Vec<usize>,
	///The period in base cycles of the channel attached to each port.
	port_channel_period: Vec<Time>,
	///The input queues, indexed as `port*num_virtual_channels+virtual_channel`.
	input_queues: Vec<InputQueue>,
	///The output queues, indexed likewise.
	output_queues: Vec<OutputQueue>,
	vc_scheduler: VcScheduler,
	///The scheduler of the main crossbar. Its credits track the output queue space.
	crossbar_scheduler: CrossbarScheduler,
	///One single-port scheduler per output port, running at the channel frequency. Its
	///credits track the input buffers of the neighbour.
	output_crossbar_schedulers: Vec<CrossbarScheduler>,
	congestion_status: Rc<RefCell<CongestionStatus>>,
	#[allow(dead_code)]
	congestion_mode: CongestionMode,
	///The per-port output processes. Built lazily on the first `process`, when the link
	///classes are reachable.
	output_stages: Vec<Rc<RefCell<internal::OutputStage>>>,
	///When the next flit of the packet occupying each port must arrive. None when no
	///packet is open on the port, so a head is welcome whatever the idle gap was.
	expected_arrival: Vec<Option<Time>>,
	///The packet each port is currently receiving.
	expected_packet: Vec<Option<Rc<Packet>>>,
	///The virtual channel latched by the head of the packet being received on each port.
	port_virtual_channel: Vec<Option<usize>>,
	///Credits owed upstream, accumulated during the cycle and sent as one envelope per port.
	credits_to_send: Vec<Vec<usize>>,
	///Capacity of the credit envelope of each port.
	credit_envelope_size: Vec<usize>,

	//statistics:
	///The first cycle included in the statistics.
	statistics_begin_cycle: Time,
	statistics_packets_arrived: usize,
	statistics_packets_departed: usize,
	///Accumulated over time, averaged per port.
	statistics_input_occupation_per_vc: Vec<f64>,
	///Accumulated over time, averaged per port.
	statistics_output_occupation_per_vc: Vec<f64>,
}

impl InputOutputQueued
{
	pub fn new(arg:RouterBuilderArgument) -> Rc<RefCell<InputOutputQueued>>
	{
		let RouterBuilderArgument{
			router_index,
			cv,
			plugs,
			num_ports,
			port_link_class,
			link_classes,
			general_frequency_divisor,
			rng,
			..
		} = arg;
		let mut virtual_channels = None;
		let mut input_queue_depth = None;
		let mut output_queue_depth = None;
		let mut vca_swa_wait = false;
		let mut crossbar_delay : Time = 0;
		let mut crossbar_frequency_divisor = general_frequency_divisor;
		let mut vc_scheduler_cv = None;
		let mut crossbar_scheduler_cv = None;
		let mut output_crossbar_scheduler_cv = None;
		let mut congestion_mode = None;
		let mut congestion_status_cv = None;
		match_object_panic!(cv,"InputOutputQueued",value,
			"virtual_channels" => virtual_channels = Some(value.as_usize().expect("bad value for virtual_channels")),
			"input_queue_depth" => input_queue_depth = Some(value.as_usize().expect("bad value for input_queue_depth")),
			"output_queue_depth" => output_queue_depth = Some(value.as_usize().expect("bad value for output_queue_depth")),
			"vca_swa_wait" => vca_swa_wait = value.as_bool().expect("bad value for vca_swa_wait"),
			"crossbar_delay" | "delay" => crossbar_delay = value.as_time().expect("bad value for crossbar_delay"),
			"crossbar_frequency_divisor" => crossbar_frequency_divisor = value.as_time().expect("bad value for crossbar_frequency_divisor"),
			"vc_scheduler" => vc_scheduler_cv = Some(value.clone()),
			"crossbar_scheduler" => crossbar_scheduler_cv = Some(value.clone()),
			"output_crossbar_scheduler" => output_crossbar_scheduler_cv = Some(value.clone()),
			"congestion_mode" => congestion_mode = Some(CongestionMode::parse(value.as_str().expect("bad value for congestion_mode"))),
			"congestion_status" => congestion_status_cv = Some(value.clone()),
		);
		let virtual_channels = virtual_channels.expect("There were no virtual_channels");
		let input_queue_depth = input_queue_depth.expect("There were no input_queue_depth");
		let output_queue_depth = output_queue_depth.expect("There were no output_queue_depth");
		let vc_scheduler_cv = vc_scheduler_cv.expect("There were no vc_scheduler");
		let crossbar_scheduler_cv = crossbar_scheduler_cv.expect("There were no crossbar_scheduler");
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
		let input_queues = (0..total_vcs).map(|index|InputQueue::new(
			format!("Router{}.InputQueue_{}_{}",router_index,index/virtual_channels,index%virtual_channels),
			index/virtual_channels,
			index%virtual_channels,
			input_queue_depth,
			vca_swa_wait,
		)).collect();
		let output_queues = (0..total_vcs).map(|index|OutputQueue::new(
			format!("Router{}.OutputQueue_{}_{}",router_index,index/virtual_channels,index%virtual_channels),
			index%virtual_channels,
			output_queue_depth,
		)).collect();
		let vc_scheduler = VcScheduler::new(VcSchedulerBuilderArgument{
			cv:&vc_scheduler_cv,
			name:format!("Router{}.VcScheduler",router_index),
			num_clients:total_vcs,
			total_vcs,
			plugs,
			rng:&mut *rng,
		});
		let mut crossbar_scheduler = CrossbarScheduler::new(CrossbarSchedulerBuilderArgument{
			cv:&crossbar_scheduler_cv,
			name:format!("Router{}.CrossbarScheduler",router_index),
			num_clients:total_vcs,
			total_vcs,
			crossbar_ports:num_ports,
			global_vc_offset:0,
			plugs,
			rng:&mut *rng,
		});
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
		//wire the congestion device into the credit traffic it should mirror
		if congestion_mode==CongestionMode::Output || congestion_mode==CongestionMode::OutputAndDownstream
		{
			crossbar_scheduler.add_credit_watcher(congestion_status.clone());
		}
		if congestion_mode==CongestionMode::Downstream || congestion_mode==CongestionMode::OutputAndDownstream
		{
			for scheduler in output_crossbar_schedulers.iter_mut()
			{
				scheduler.add_credit_watcher(congestion_status.clone());
			}
		}
		//credit pools: the main crossbar covers the output queues, each output scheduler
		//covers the input buffers of its neighbour
		for vc_index in 0..total_vcs
		{
			crossbar_scheduler.init_credit_count(vc_index,output_queue_depth);
		}
		for scheduler in output_crossbar_schedulers.iter_mut()
		{
			for virtual_channel in 0..virtual_channels
			{
				scheduler.init_credit_count(virtual_channel,input_queue_depth);
			}
		}
		let port_channel_period : Vec<Time> = port_link_class.iter().map(|&link_class|link_classes[link_class].frequency_divisor).collect();
		let credit_envelope_size = port_channel_period.iter().map(|&channel_period|{
			let router_period = crossbar_frequency_divisor;
			//enough to acknowledge a full router cycle of flits in one envelope
			(((router_period+channel_period-1)/channel_period) as usize) * virtual_channels
		}).collect();
		let r = Rc::new(RefCell::new(InputOutputQueued{
			self_rc: Weak::new(),
			next_events: vec![],
			last_process_at_cycle: None,
			router_index,
			num_ports,
			num_virtual_channels: virtual_channels,
			input_queue_depth,
			output_queue_depth,
			crossbar_delay,
			crossbar_frequency_divisor,
			port_link_class: port_link_class.to_vec(),
			port_channel_period,
			input_queues,
			output_queues,
			vc_scheduler,
			crossbar_scheduler,
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
	///A flit of the main crossbar has reached its output queue. Directly called with
	///`crossbar_delay` 0, otherwise through an `internal::FlitToOutput` event.
	fn receive_crossbar_flit(&mut self, cycle:Time, out_index:usize, flit:Rc<Flit>) -> Vec<EventGeneration>
	{
		self.output_queues[out_index].receive_flit(cycle,flit);
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

impl Router for InputOutputQueued
{
	fn insert(&mut self, current_cycle:Time, flit:Rc<Flit>, port:usize, _rng:&mut StdRng) -> Vec<EventGeneration>
	{
		//back-to-back flit timing: a packet occupies its port for consecutive channel cycles
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
		//a head flit latches its virtual channel for the whole packet; the field is
		//ignored on body and tail, fixing spurious mid-packet renumbering
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
		self.input_queues[index].receive_flit(current_cycle,flit);
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
		if let Some(event) = self.schedule(current_cycle,0)
		{
			events.push(event);
		}
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
		let flits : Vec<Rc<Flit>> = self.input_queues.iter().flat_map(|queue|queue.iter_flits())
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
				if cv_name!="InputOutputQueued"
				{
					panic!("incompatible statistics, should be `InputOutputQueued` object not `{}`",cv_name);
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
						_ => panic!("Nothing to do with field {} in InputOutputQueued statistics",name),
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
		Some(ConfigurationValue::Object(String::from("InputOutputQueued"),vec![
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

impl Eventful for InputOutputQueued
{
	///Main routine of the router. Called once per router cycle with work pending.
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
		let mut cycles_span = 1;//cycles since last checked
		if let Some(last) = self.last_process_at_cycle
		{
			cycles_span = simulation.cycle - last;
			if last>=simulation.cycle
			{
				panic!("Trying to process at cycle {} a router::InputOutputQueued already processed at {}",simulation.cycle,last);
			}
		}
		self.last_process_at_cycle = Some(simulation.cycle);
		assert!(simulation.cycle%self.crossbar_frequency_divisor==0,"Processing InputOutputQueued router at a cycle ({}) not multiple of its crossbar_frequency_divisor ({})",simulation.cycle,self.crossbar_frequency_divisor);
		//-- gather cycle statistics
		for (index,queue) in self.input_queues.iter().enumerate()
		{
			self.statistics_input_occupation_per_vc[index%self.num_virtual_channels] += (queue.occupation()*cycles_span as usize) as f64/self.num_ports as f64;
		}
		for (index,queue) in self.output_queues.iter().enumerate()
		{
			self.statistics_output_occupation_per_vc[index%self.num_virtual_channels] += (queue.occupation()*cycles_span as usize) as f64/self.num_ports as f64;
		}
		//-- resolve the virtual channel requests registered last cycle
		let vc_responses = self.vc_scheduler.execute_cycle(&mut mutable.rng);
		for response in vc_responses
		{
			let notification = self.input_queues[response.client].vc_scheduler_response(response.vc_index,self.num_virtual_channels);
			if let Some((flit,port,virtual_channel)) = notification
			{
				simulation.routing.vc_scheduled(&flit,port,virtual_channel);
			}
		}
		//-- resolve the crossbar requests registered last cycle
		let crossbar_responses = self.crossbar_scheduler.execute_cycle(&mut mutable.rng);
		for response in crossbar_responses
		{
			self.input_queues[response.client].crossbar_scheduler_response(response.port);
		}
		//-- evaluate the input pipelines
		let mut events = vec![];
		let mut recheck = false;
		{
			let InputOutputQueued{
				ref self_rc,
				ref mut input_queues,
				ref mut output_queues,
				ref mut vc_scheduler,
				ref mut crossbar_scheduler,
				ref mut credits_to_send,
				ref output_stages,
				num_virtual_channels,
				router_index,
				crossbar_delay,
				..
			} = *self;
			for index in 0..input_queues.len()
			{
				let outcome = {
					let mut context = PipelineContext{
						cycle: simulation.cycle,
						router_index,
						num_virtual_channels,
						routing: simulation.routing.as_ref(),
						vc_scheduler: &mut *vc_scheduler,
						crossbar_scheduler: &mut *crossbar_scheduler,
						rng: &mut mutable.rng,
					};
					input_queues[index].evaluate(&mut context)
				};
				if let Some((flit,out_port,out_virtual_channel)) = outcome.injected
				{
					let out_index = out_port*num_virtual_channels+out_virtual_channel;
					if crossbar_delay==0
					{
						output_queues[out_index].receive_flit(simulation.cycle,flit);
						if let Some(event) = output_stages[out_port].borrow_mut().schedule(simulation.cycle,0)
						{
							events.push(event);
						}
					}
					else
					{
						let event = Rc::<RefCell<internal::FlitToOutput>>::from(internal::FlitToOutputArgument{
							router: self_rc.upgrade().expect("missing router"),
							out_index,
							flit,
						});
						events.push(EventGeneration{
							delay: crossbar_delay,
							position: CyclePosition::Begin,
							event: Event::Generic(event),
						});
					}
				}
				if outcome.credit_returned
				{
					credits_to_send[index/num_virtual_channels].push(index%num_virtual_channels);
				}
				recheck = recheck || outcome.active;
			}
		}
		//-- send the credit envelopes owed upstream
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
		self.next_events.pop();//remove the event that was served.
		if recheck || !self.crossbar_scheduler.is_idle() || self.vc_scheduler.has_requests()
		{
			let next_delay = event::round_to_multiple(simulation.cycle+1,self.crossbar_frequency_divisor)-simulation.cycle;
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
	/**
	We schedule in cycles multiple of the `crossbar_frequency_divisor`.
	Note the outputs of the router are instead scheduled by `OutputStage::schedule`.
	**/
	fn schedule(&mut self, current_cycle:Time, delay:Time) -> Option<EventGeneration>
	{
		let target = current_cycle+delay;
		let target = event::round_to_multiple(target,self.crossbar_frequency_divisor);
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

impl Quantifiable for InputOutputQueued
{
	fn total_memory(&self) -> usize
	{
		size_of::<InputOutputQueued>()
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

/// Some things private to InputOutputQueued we want to have clearly separated.
mod internal
{
	use super::*;
	use crate::LinkClass;

	/**
	Insert a flit into an output queue. Created when the crossbar has a nonzero traversal
	delay; with delay zero the router inserts directly.
	**/
	pub struct FlitToOutput
	{
		self_rc: Weak<RefCell<FlitToOutput>>,
		router: Rc<RefCell<InputOutputQueued>>,
		out_index: usize,
		flit: Rc<Flit>,
	}
	pub struct FlitToOutputArgument
	{
		pub router: Rc<RefCell<InputOutputQueued>>,
		pub out_index: usize,
		pub flit: Rc<Flit>,
	}
	impl From<FlitToOutputArgument> for Rc<RefCell<FlitToOutput>>
	{
		fn from(arg:FlitToOutputArgument) -> Rc<RefCell<FlitToOutput>>
		{
			let event = Rc::new(RefCell::new(FlitToOutput{
				self_rc: Weak::new(),
				router: arg.router,
				out_index: arg.out_index,
				flit: arg.flit,
			}));
			event.borrow_mut().self_rc = Rc::<_>::downgrade(&event);
			event
		}
	}
	impl Eventful for FlitToOutput
	{
		fn process(&mut self, simulation:&SimulationShared, _mutable:&mut SimulationMut) -> Vec<EventGeneration>
		{
			let mut router = self.router.borrow_mut();
			router.receive_crossbar_flit(simulation.cycle,self.out_index,self.flit.clone())
		}
		fn as_eventful(&self) -> Weak<RefCell<dyn Eventful>>
		{
			self.self_rc.clone()
		}
	}

	/**
	Process an output port at the channel frequency: resolve its output crossbar scheduler,
	advance its queues, and put at most one flit per channel cycle on the wire.
	**/
	pub struct OutputStage
	{
		self_rc: Weak<RefCell<OutputStage>>,
		router: Rc<RefCell<InputOutputQueued>>,
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
		pub router: &'a mut InputOutputQueued,
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
				if outcome.popped
				{
					//the output queue slot is free again for the main crossbar
					router.crossbar_scheduler.increment_credit_count(index);
				}
				if let Some(flit) = outcome.emitted
				{
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
			if active
			{
				//the router also reruns, e.g. to apply the freed credits to its crossbar
				if let Some(event) = router.schedule(simulation.cycle,1)
				{
					events.push(event);
				}
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

#[cfg(test)]
mod tests
{
	use super::*;
	use crate::{Plugs,LinkClass,Message};
	use crate::routing::RoutingExtension;
	use ::rand::SeedableRng;

	fn scheduler_cv() -> ConfigurationValue
	{
		ConfigurationValue::Object("CrossbarScheduler".to_string(),vec![
			("full_packet".to_string(),ConfigurationValue::False),
			("packet_lock".to_string(),ConfigurationValue::False),
			("idle_unlock".to_string(),ConfigurationValue::False),
			("allocator".to_string(),ConfigurationValue::Object("Islip".to_string(),vec![
				("iterations".to_string(),ConfigurationValue::Number(1.0)),
				("slip_latch".to_string(),ConfigurationValue::True),
				("resource_arbiter".to_string(),ConfigurationValue::Object("Lslp".to_string(),vec![])),
				("client_arbiter".to_string(),ConfigurationValue::Object("Lslp".to_string(),vec![])),
			])),
		])
	}

	fn router_cv() -> ConfigurationValue
	{
		ConfigurationValue::Object("InputOutputQueued".to_string(),vec![
			("virtual_channels".to_string(),ConfigurationValue::Number(2.0)),
			("input_queue_depth".to_string(),ConfigurationValue::Number(8.0)),
			("output_queue_depth".to_string(),ConfigurationValue::Number(8.0)),
			("vc_scheduler".to_string(),ConfigurationValue::Object("VcScheduler".to_string(),vec![
				("allocator".to_string(),ConfigurationValue::Object("Islip".to_string(),vec![
					("iterations".to_string(),ConfigurationValue::Number(1.0)),
					("slip_latch".to_string(),ConfigurationValue::True),
					("resource_arbiter".to_string(),ConfigurationValue::Object("Lslp".to_string(),vec![])),
					("client_arbiter".to_string(),ConfigurationValue::Object("Lslp".to_string(),vec![])),
				])),
			])),
			("crossbar_scheduler".to_string(),scheduler_cv()),
			("output_crossbar_scheduler".to_string(),scheduler_cv()),
			("congestion_mode".to_string(),ConfigurationValue::Literal("downstream".to_string())),
			("congestion_status".to_string(),ConfigurationValue::Object("CongestionStatus".to_string(),vec![
				("style".to_string(),ConfigurationValue::Literal("relative".to_string())),
			])),
		])
	}

	fn build_router(rng:&mut StdRng) -> Rc<RefCell<InputOutputQueued>>
	{
		let plugs = Plugs::default();
		let link_classes = vec![ LinkClass{ delay:1, frequency_divisor:1 } ];
		let port_link_class = vec![0,0];
		let cv = router_cv();
		InputOutputQueued::new(RouterBuilderArgument{
			router_index: 0,
			cv: &cv,
			plugs: &plugs,
			num_ports: 2,
			port_link_class: &port_link_class,
			link_classes: &link_classes,
			maximum_packet_size: 4,
			general_frequency_divisor: 1,
			rng,
		})
	}

	fn test_packet(size:usize) -> Rc<Packet>
	{
		let message = Rc::new(Message{
			origin: 0,
			destination: 1,
			source_address: vec![0],
			destination_address: vec![1],
			size,
			creation_cycle: 0,
			transaction: 0,
			traffic_class: 0,
			protocol_class: 0,
			op_code: 0,
		});
		Rc::new(Packet{
			size,
			message,
			index: 0,
			hop_count: RefCell::new(0),
			metadata: RefCell::new(0),
			routing_extension: RefCell::new(RoutingExtension::None),
			cycle_into_network: RefCell::new(0),
		})
	}

	fn test_flit(packet:&Rc<Packet>, index:usize) -> Rc<Flit>
	{
		Rc::new(Flit{
			packet: packet.clone(),
			index,
			virtual_channel: RefCell::new(if index==0 { Some(0) } else { None }),
			send_cycle: RefCell::new(0),
			receive_cycle: RefCell::new(0),
		})
	}

	#[test]
	fn accepts_backtoback_and_idle_gaps()
	{
		let mut rng = StdRng::seed_from_u64(400u64);
		let router = build_router(&mut rng);
		let mut router = router.borrow_mut();
		let packet = test_packet(4);
		for index in 0..4
		{
			router.insert(10+index as Time,test_flit(&packet,index),0,&mut rng);
		}
		//the port closed on the tail, a head is welcome after any gap
		let next = test_packet(2);
		router.insert(15,test_flit(&next,0),0,&mut rng);
		router.insert(16,test_flit(&next,1),0,&mut rng);
	}

	#[test]
	#[should_panic(expected="interleaved")]
	fn rejects_midpacket_second_packet()
	{
		let mut rng = StdRng::seed_from_u64(401u64);
		let router = build_router(&mut rng);
		let mut router = router.borrow_mut();
		let packet = test_packet(4);
		router.insert(10,test_flit(&packet,0),0,&mut rng);
		router.insert(11,test_flit(&packet,1),0,&mut rng);
		//another packet barges into the same port before the tail
		let intruder = test_packet(4);
		router.insert(12,test_flit(&intruder,0),0,&mut rng);
	}

	#[test]
	#[should_panic(expected="arrived at")]
	fn rejects_gap_within_packet()
	{
		let mut rng = StdRng::seed_from_u64(402u64);
		let router = build_router(&mut rng);
		let mut router = router.borrow_mut();
		let packet = test_packet(4);
		router.insert(10,test_flit(&packet,0),0,&mut rng);
		//the second flit skips a channel cycle
		router.insert(12,test_flit(&packet,1),0,&mut rng);
	}

	#[test]
	fn congestion_starts_uncongested()
	{
		let mut rng = StdRng::seed_from_u64(403u64);
		let router = build_router(&mut rng);
		let router = router.borrow();
		for port in 0..2
		{
			for virtual_channel in 0..2
			{
				assert_eq!(router.congestion_status(0,0,port,virtual_channel),0.0);
			}
		}
	}
}

