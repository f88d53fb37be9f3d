
/*!
Sinks for the delivery records the core produces.

The core calls `log_message` exactly once per delivered message, with the timestamps its
flits accumulated, and brackets transactions with `start_transaction`/`end_transaction`.
What a sink does with the records is outside the core; the simulation harness keeps them
in memory.
*/

use std::rc::Rc;

use crate::{Flit,Message};
use crate::event::Time;

///Where the core reports message deliveries and transaction brackets.
pub trait MessageLog
{
	///Called once per delivered message, with every flit of the message in arrival order.
	fn log_message(&mut self, message:&Rc<Message>, flits:&[Rc<Flit>], delivery_cycle:Time);
	///A transaction has begun.
	fn start_transaction(&mut self, _transaction:u64, _cycle:Time)
	{
	}
	///A transaction has completed.
	fn end_transaction(&mut self, _transaction:u64, _cycle:Time)
	{
	}
}

///Discards everything.
pub struct NullMessageLog;

impl MessageLog for NullMessageLog
{
	fn log_message(&mut self, _message:&Rc<Message>, _flits:&[Rc<Flit>], _delivery_cycle:Time)
	{
	}
}

///The delivery record of one message.
#[derive(Debug,Clone)]
pub struct MessageRecord
{
	pub origin: usize,
	pub destination: usize,
	pub size: usize,
	pub transaction: u64,
	pub creation_cycle: Time,
	pub delivery_cycle: Time,
	///When each flit left its terminal, in message order.
	pub flit_send_cycles: Vec<Time>,
	///When each flit reached the destination terminal, in arrival order.
	pub flit_receive_cycles: Vec<Time>,
}

///Keeps every record in memory.
#[derive(Default)]
pub struct VecMessageLog
{
	pub records: Vec<MessageRecord>,
	///(transaction, start cycle, end cycle if closed)
	pub transactions: Vec<(u64,Time,Option<Time>)>,
}

impl MessageLog for VecMessageLog
{
	fn log_message(&mut self, message:&Rc<Message>, flits:&[Rc<Flit>], delivery_cycle:Time)
	{
		self.records.push(MessageRecord{
			origin: message.origin,
			destination: message.destination,
			size: message.size,
			transaction: message.transaction,
			creation_cycle: message.creation_cycle,
			delivery_cycle,
			flit_send_cycles: flits.iter().map(|flit|*flit.send_cycle.borrow()).collect(),
			flit_receive_cycles: flits.iter().map(|flit|*flit.receive_cycle.borrow()).collect(),
		});
	}
	fn start_transaction(&mut self, transaction:u64, cycle:Time)
	{
		self.transactions.push((transaction,cycle,None));
	}
	fn end_transaction(&mut self, transaction:u64, cycle:Time)
	{
		for entry in self.transactions.iter_mut().rev()
		{
			if entry.0==transaction && entry.2.is_none()
			{
				entry.2 = Some(cycle);
				return;
			}
		}
		panic!("ending transaction {} which was never started",transaction);
	}
}
