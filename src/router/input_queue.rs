
/*!
The input side of a router port: a bounded flit FIFO per (port, virtual channel) pair and
its three-stage pipeline.

| Stage | Purpose |
|-------|---------|
| RFE | For head flits, ask the routing algorithm for the candidate (port, vc) egresses. Body and tail pass through. |
| VCA | For head flits, acquire one downstream virtual channel among the candidates; the award is latched for the whole packet. |
| SWA | Win the crossbar towards the allocated output; on grant the flit enters the crossbar, consuming a credit, and the tail releases the virtual channel. |

Each stage holds at most one flit; a stage holding more is a corrupted pipeline and panics.
The owning router evaluates the pipeline once per router cycle and dispatches the scheduler
responses back before the next evaluation.
*/

use std::collections::VecDeque;
use std::rc::Rc;

use ::rand::rngs::StdRng;

use crate::Flit;
use crate::event::Time;
use crate::routing::{Routing,RoutingRequest};
use crate::scheduler::crossbar::CrossbarScheduler;
use crate::scheduler::virtual_channel::VcScheduler;

///The states a pipeline stage record goes through. At most one flit lives in a stage.
#[derive(Clone,Copy,PartialEq,Eq,Debug)]
pub enum PipelineState
{
	Empty,
	WaitingToRequest,
	WaitingForResponse,
	ReadyToAdvance,
	///Holding a flit whose whole packet is to be pulled at once. Only used by the
	///output-queued router.
	WaitingForTransfer,
}

struct RfeStage
{
	state: PipelineState,
	flit: Option<Rc<Flit>>,
	///The (port, virtual channel) candidates returned by the routing algorithm.
	candidates: Vec<(usize,usize)>,
}

struct VcaStage
{
	state: PipelineState,
	flit: Option<Rc<Flit>>,
	candidates: Vec<(usize,usize)>,
	///The egress awarded to the current packet. Set by the head, inherited by body and
	///tail, cleared when the tail advances.
	allocated: Option<(usize,usize)>,
}

struct SwaStage
{
	state: PipelineState,
	flit: Option<Rc<Flit>>,
	allocated: Option<(usize,usize)>,
}

///What the router needs back from evaluating one input pipeline.
#[derive(Default)]
pub struct PipelineOutcome
{
	///A flit granted the crossbar this cycle, with its output (port, virtual channel).
	pub injected: Option<(Rc<Flit>,usize,usize)>,
	///Whether a flit was popped from the FIFO, owing one credit upstream.
	pub credit_returned: bool,
	///Whether the pipeline has pending work and the router must process the next cycle.
	pub active: bool,
}

///Everything an input pipeline touches while being evaluated. Borrowed from the owning
///router for the duration of one `evaluate` call.
pub struct PipelineContext<'a>
{
	pub cycle: Time,
	pub router_index: usize,
	pub num_virtual_channels: usize,
	pub routing: &'a dyn Routing,
	pub vc_scheduler: &'a mut VcScheduler,
	pub crossbar_scheduler: &'a mut CrossbarScheduler,
	pub rng: &'a mut StdRng,
}

///See the [module documentation](index.html).
pub struct InputQueue
{
	///Name used on fatal diagnostics, e.g. "Router2.InputQueue_3_1".
	name: String,
	port: usize,
	virtual_channel: usize,
	depth: usize,
	///Gate VCA requests until SWA is empty, avoiding a request pattern that can starve.
	vca_swa_wait: bool,
	buffer: VecDeque<Rc<Flit>>,
	///Cycle of the last reception, to enforce one flit per channel cycle.
	last_received_cycle: Option<Time>,
	rfe: RfeStage,
	vca: VcaStage,
	swa: SwaStage,
}

impl InputQueue
{
	pub fn new(name:String, port:usize, virtual_channel:usize, depth:usize, vca_swa_wait:bool) -> InputQueue
	{
		if depth==0
		{
			panic!("{}: input queues must have some capacity",name);
		}
		InputQueue{
			name,
			port,
			virtual_channel,
			depth,
			vca_swa_wait,
			buffer: VecDeque::new(),
			last_received_cycle: None,
			rfe: RfeStage{ state:PipelineState::Empty, flit:None, candidates:vec![] },
			vca: VcaStage{ state:PipelineState::Empty, flit:None, candidates:vec![], allocated:None },
			swa: SwaStage{ state:PipelineState::Empty, flit:None, allocated:None },
		}
	}
	pub fn depth(&self) -> usize
	{
		self.depth
	}
	///Number of flits currently buffered, not counting the ones inside pipeline stages.
	pub fn occupation(&self) -> usize
	{
		self.buffer.len()
	}
	pub fn is_idle(&self) -> bool
	{
		self.buffer.is_empty()
			&& self.rfe.state==PipelineState::Empty
			&& self.vca.state==PipelineState::Empty
			&& self.swa.state==PipelineState::Empty
	}
	pub fn iter_flits(&self) -> impl Iterator<Item=Rc<Flit>> + '_
	{
		self.buffer.iter().cloned()
			.chain(self.rfe.flit.iter().cloned())
			.chain(self.vca.flit.iter().cloned())
			.chain(self.swa.flit.iter().cloned())
	}
	///A flit has arrived from the channel.
	pub fn receive_flit(&mut self, cycle:Time, flit:Rc<Flit>)
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
	///The verdict of the virtual-channel scheduler for the request made last cycle.
	///Returns the flit and its egress when granted, for the router to notify the routing.
	pub fn vc_scheduler_response(&mut self, vc_index:Option<usize>, num_virtual_channels:usize) -> Option<(Rc<Flit>,usize,usize)>
	{
		if self.vca.state!=PipelineState::WaitingForResponse
		{
			panic!("{}: virtual channel response without a pending request",self.name);
		}
		match vc_index
		{
			Some(index) =>
			{
				let port = index/num_virtual_channels;
				let virtual_channel = index%num_virtual_channels;
				self.vca.allocated = Some((port,virtual_channel));
				self.vca.state = PipelineState::ReadyToAdvance;
				let flit = self.vca.flit.as_ref().expect("VCA responded without a flit").clone();
				Some((flit,port,virtual_channel))
			},
			None =>
			{
				self.vca.state = PipelineState::WaitingToRequest;
				None
			},
		}
	}
	///The verdict of the crossbar scheduler for the request made last cycle.
	pub fn crossbar_scheduler_response(&mut self, port:Option<usize>)
	{
		if self.swa.state!=PipelineState::WaitingForResponse
		{
			panic!("{}: crossbar response without a pending request",self.name);
		}
		self.swa.state = match port
		{
			Some(_) => PipelineState::ReadyToAdvance,
			None => PipelineState::WaitingToRequest,
		};
	}
	///Advance the pipeline by one router cycle. Stages are visited from the crossbar
	///backwards so a flit moves at most one stage per cycle.
	pub fn evaluate(&mut self, context:&mut PipelineContext) -> PipelineOutcome
	{
		let mut outcome = PipelineOutcome::default();
		let client = self.port*context.num_virtual_channels + self.virtual_channel;
		//load the crossbar
		if self.swa.state==PipelineState::ReadyToAdvance
		{
			let flit = self.swa.flit.take().expect("SWA ready without a flit");
			let (port,virtual_channel) = self.swa.allocated.take().expect("SWA ready without an egress");
			let vc_index = port*context.num_virtual_channels + virtual_channel;
			context.crossbar_scheduler.decrement_credit_count(vc_index);
			if flit.is_tail()
			{
				//NOTE: releasing on the tail stalls back-to-back packets reusing the
				//virtual channel; the head of the next packet re-acquires it.
				context.vc_scheduler.release_vc(vc_index);
			}
			outcome.injected = Some((flit,port,virtual_channel));
			self.swa.state = PipelineState::Empty;
		}
		//load SWA from VCA
		if self.swa.state==PipelineState::Empty && self.vca.state==PipelineState::ReadyToAdvance
		{
			if self.swa.flit.is_some()
			{
				panic!("{}: SWA stage holding a flit while empty",self.name);
			}
			let flit = self.vca.flit.take().expect("VCA ready without a flit");
			let (port,virtual_channel) = self.vca.allocated.expect("VCA ready without an egress");
			*flit.virtual_channel.borrow_mut() = Some(virtual_channel);
			let is_tail = flit.is_tail();
			self.swa.flit = Some(flit);
			self.swa.allocated = Some((port,virtual_channel));
			self.swa.state = PipelineState::WaitingToRequest;
			self.vca.state = PipelineState::Empty;
			self.vca.candidates.clear();
			if is_tail
			{
				//the award dies with the packet
				self.vca.allocated = None;
			}
		}
		//submit the SWA request
		if self.swa.state==PipelineState::WaitingToRequest
		{
			let flit = self.swa.flit.as_ref().expect("SWA requesting without a flit");
			let (port,virtual_channel) = self.swa.allocated.expect("SWA requesting without an egress");
			let vc_index = port*context.num_virtual_channels + virtual_channel;
			context.crossbar_scheduler.request(client,port,vc_index,flit);
			self.swa.state = PipelineState::WaitingForResponse;
		}
		//load VCA from RFE
		if self.vca.state==PipelineState::Empty && self.rfe.state==PipelineState::ReadyToAdvance
		{
			if self.vca.flit.is_some()
			{
				panic!("{}: VCA stage holding a flit while empty",self.name);
			}
			let flit = self.rfe.flit.take().expect("RFE ready without a flit");
			if flit.is_head()
			{
				if self.vca.allocated.is_some()
				{
					panic!("{}: a head flit found the virtual channel of the previous packet still latched",self.name);
				}
				self.vca.state = PipelineState::WaitingToRequest;
			}
			else
			{
				//body and tail inherit the award latched by their head
				if self.vca.allocated.is_none()
				{
					panic!("{}: a body flit advanced without a latched virtual channel",self.name);
				}
				self.vca.state = PipelineState::ReadyToAdvance;
			}
			self.vca.flit = Some(flit);
			self.vca.candidates = std::mem::take(&mut self.rfe.candidates);
			self.rfe.state = PipelineState::Empty;
		}
		//submit the VCA requests
		if self.vca.state==PipelineState::WaitingToRequest && (self.swa.state==PipelineState::Empty || !self.vca_swa_wait)
		{
			let flit = self.vca.flit.as_ref().expect("VCA requesting without a flit");
			if !flit.is_head()
			{
				panic!("{}: only head flits request virtual channels",self.name);
			}
			if self.vca.candidates.is_empty()
			{
				panic!("{}: a head flit reached VCA without candidates",self.name);
			}
			let metadata = *flit.packet.metadata.borrow();
			for &(port,virtual_channel) in self.vca.candidates.iter()
			{
				let vc_index = port*context.num_virtual_channels + virtual_channel;
				context.vc_scheduler.request(client,vc_index,metadata);
			}
			self.vca.state = PipelineState::WaitingForResponse;
		}
		//load RFE from the buffer
		if self.rfe.state==PipelineState::Empty && !self.buffer.is_empty()
		{
			let flit = self.buffer.pop_front().expect("There are no flits");
			//the buffer slot is free again, return a credit upstream
			outcome.credit_returned = true;
			self.rfe.flit = Some(flit);
			self.rfe.state = PipelineState::WaitingToRequest;
		}
		//submit the routing request
		if self.rfe.state==PipelineState::WaitingToRequest
		{
			let flit = self.rfe.flit.as_ref().expect("RFE requesting without a flit");
			if flit.is_head()
			{
				let request = RoutingRequest{
					packet: &flit.packet,
					router_index: context.router_index,
					entry_port: self.port,
					entry_virtual_channel: self.virtual_channel,
					num_virtual_channels: context.num_virtual_channels,
				};
				let response = context.routing.next(&request,context.rng).unwrap_or_else(|e|panic!("{}: error {} while routing",self.name,e));
				if response.is_empty()
				{
					if response.idempotent
					{
						panic!("{}: there are no routes for packet {:?} towards terminal {}",self.name,flit.packet,flit.packet.message.destination);
					}
					//There are currently no good choices, but there may be in the future.
				}
				else
				{
					self.rfe.candidates = response.candidates.into_iter().map(|candidate|(candidate.port,candidate.virtual_channel)).collect();
					self.rfe.state = PipelineState::ReadyToAdvance;
				}
			}
			else
			{
				self.rfe.state = PipelineState::ReadyToAdvance;
			}
		}
		outcome.active = !self.is_idle();
		outcome
	}
}
