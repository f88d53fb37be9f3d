
/*!
The buffer between the crossbar and an output channel.

In the input-output-queued router each (port, virtual channel) pair owns a bounded queue
filled by the main crossbar; popping a flit returns a credit to the main crossbar
scheduler, and the queue competes with its port siblings for the physical channel through
the per-port output crossbar scheduler. In the output-queued router the queue receives
whole packets at once and is unbounded.

The queue guarantees at most one flit onto the channel per channel cycle, which the single
port of the output crossbar scheduler enforces.
*/

use std::collections::VecDeque;
use std::rc::Rc;

use crate::Flit;
use crate::event::Time;
use crate::router::input_queue::PipelineState;
use crate::scheduler::crossbar::CrossbarScheduler;

///What the router needs back from evaluating one output queue.
#[derive(Default)]
pub struct OutputOutcome
{
	///A flit that crossed the output stage this channel cycle, to be put on the wire.
	pub emitted: Option<Rc<Flit>>,
	///Whether a flit left the buffer, freeing one slot of the upstream pool.
	pub popped: bool,
	///Whether the queue has pending work.
	pub active: bool,
}

///See the [module documentation](index.html).
pub struct OutputQueue
{
	///Name used on fatal diagnostics, e.g. "Router2.OutputQueue_3_1".
	name: String,
	virtual_channel: usize,
	///Buffer capacity in flits; 0 stands for unbounded, as in the output-queued router.
	depth: usize,
	///Buffered flits with their arrival cycle. A flit is only eligible for the output
	///stage on a later cycle than its arrival, whatever the event interleaving was.
	buffer: VecDeque<(Rc<Flit>,Time)>,
	state: PipelineState,
	flit: Option<Rc<Flit>>,
}

impl OutputQueue
{
	pub fn new(name:String, virtual_channel:usize, depth:usize) -> OutputQueue
	{
		OutputQueue{
			name,
			virtual_channel,
			depth,
			buffer: VecDeque::new(),
			state: PipelineState::Empty,
			flit: None,
		}
	}
	pub fn occupation(&self) -> usize
	{
		self.buffer.len()
	}
	pub fn is_idle(&self) -> bool
	{
		self.buffer.is_empty() && self.state==PipelineState::Empty
	}
	pub fn iter_flits(&self) -> impl Iterator<Item=Rc<Flit>> + '_
	{
		self.buffer.iter().map(|(flit,_)|flit.clone()).chain(self.flit.iter().cloned())
	}
	///A flit has crossed the main crossbar into this queue.
	pub fn receive_flit(&mut self, cycle:Time, flit:Rc<Flit>)
	{
		let flit_virtual_channel = flit.virtual_channel.borrow().expect("the flit should have an assigned virtual channel");
		if flit_virtual_channel!=self.virtual_channel
		{
			panic!("{}: receiving a flit of virtual channel {} in the queue of {}",self.name,flit_virtual_channel,self.virtual_channel);
		}
		if self.depth>0 && self.buffer.len()>=self.depth
		{
			panic!("{}: buffer overflow beyond depth {}",self.name,self.depth);
		}
		self.buffer.push_back((flit,cycle));
	}
	///A whole packet has been transferred into this queue. Output-queued routers only.
	pub fn receive_packet(&mut self, cycle:Time, flits:Vec<Rc<Flit>>)
	{
		for flit in flits
		{
			let flit_virtual_channel = flit.virtual_channel.borrow().expect("the flit should have an assigned virtual channel");
			if flit_virtual_channel!=self.virtual_channel
			{
				panic!("{}: receiving a flit of virtual channel {} in the queue of {}",self.name,flit_virtual_channel,self.virtual_channel);
			}
			self.buffer.push_back((flit,cycle));
		}
	}
	///The verdict of the output crossbar scheduler for the request made last channel cycle.
	pub fn scheduler_response(&mut self, granted:bool)
	{
		if self.state!=PipelineState::WaitingForResponse
		{
			panic!("{}: output response without a pending request",self.name);
		}
		self.state = if granted { PipelineState::ReadyToAdvance } else { PipelineState::WaitingToRequest };
	}
	///Advance the output stage by one channel cycle, requesting and emitting through the
	///per-port `output_scheduler` (this queue's client index being its virtual channel).
	pub fn evaluate(&mut self, cycle:Time, output_scheduler:&mut CrossbarScheduler) -> OutputOutcome
	{
		let mut outcome = OutputOutcome::default();
		//put the granted flit on the wire
		if self.state==PipelineState::ReadyToAdvance
		{
			let flit = self.flit.take().expect("output stage ready without a flit");
			output_scheduler.decrement_credit_count(self.virtual_channel);
			outcome.emitted = Some(flit);
			self.state = PipelineState::Empty;
		}
		//load the output stage
		if self.state==PipelineState::Empty
		{
			if let Some(&(_,arrival)) = self.buffer.front()
			{
				if arrival<cycle
				{
					let (flit,_) = self.buffer.pop_front().expect("There are no flits");
					self.flit = Some(flit);
					self.state = PipelineState::WaitingToRequest;
					outcome.popped = true;
				}
			}
		}
		//submit the request for the channel
		if self.state==PipelineState::WaitingToRequest
		{
			let flit = self.flit.as_ref().expect("output stage requesting without a flit");
			output_scheduler.request(self.virtual_channel,0,self.virtual_channel,flit);
			self.state = PipelineState::WaitingForResponse;
		}
		outcome.active = !self.is_idle();
		outcome
	}
}
