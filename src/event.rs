
use std::rc::{Rc,Weak};
use std::cell::RefCell;
use std::mem::{size_of};
use std::convert::TryInto;

use crate::{Flit,Location,SimulationShared,SimulationMut};
use crate::quantify::Quantifiable;
use crate::router::Credit;
use quantifiable_derive::Quantifiable;//the derive macro

/// An amount of cycles.
pub type Time = u64;

///A trait to be implemented for generic objects to be inserted in the event queue.
pub trait Eventful
{
	///Method to be called to process the events.
	fn process(&mut self, simulation:&SimulationShared, simulation_mut:&mut SimulationMut) -> Vec<EventGeneration>;
	///Extract the eventful from the implementing class. Required since `as Rc<RefCell<Eventful>>` does not work.
	fn as_eventful(&self)->Weak<RefCell<dyn Eventful>>;
	///Schedule this component to be executed after `delay` cycles as soon as possible.
	///This should include waits to synchronize with the component's internal clock.
	///Call with 0 to schedule as soon as possible, including the current cycle.
	///Call with 1 to schedule in a future cycle as soon as possible.
	///Returns None if the component decides against to be scheduled. For example due to already being scheduled.
	fn schedule(&mut self, _current_cycle:Time, delay:Time) -> Option<EventGeneration>
	{
		let event = Event::Generic(self.as_eventful().upgrade().expect("missing component"));
		Some(EventGeneration{
			delay,
			position: CyclePosition::End,
			event,
		})
	}
}

///The events stored in the event queue.
#[derive(Clone)]
pub enum Event
{
	FlitToLocation{
		flit: Rc<Flit>,
		previous: Location,
		new: Location,
	},
	CreditToLocation{
		///Location by which the flit was sent, whose transmission status is to be informed.
		location: Location,
		credit: Credit,
	},
	Generic(Rc<RefCell<dyn Eventful>>),
}

impl Quantifiable for Event
{
	fn total_memory(&self) -> usize
	{
		let mut total= size_of::<Self>();
		match self
		{
			&Event::FlitToLocation{
				ref flit,
				previous: _,
				new: _,
			} => total+=flit.as_ref().total_memory(),
			_ => (),
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

///This is used to sort the processing of the events inside a cycle.
///If some event occurs at Begin then its result will be visible for events at End.
///Specifically, we ensure that all the flits and credits have arrived before arbitrating.
///Currently at Begin: flit movements and credits.
///Currently at End: Generics.
pub enum CyclePosition
{
	Begin,
	End,
}

///Encapsulates a request for insertion on the event queue.
pub struct EventGeneration
{
	///To insert the event after `delay` cycles.
	pub delay: Time,
	///Whether the event should be processed at the begin or the end of its cycle.
	pub position: CyclePosition,
	///The actual event to be inserted.
	pub event: Event,
}

///The event queue structure managing the insertion and extraction of events.
#[derive(Quantifiable)]
pub struct EventQueue
{
	event_begin_circle: Vec<Vec<Event>>,//Events to be processed at the beginning of a cycle (mostly arrivals of flits)
	event_end_circle: Vec<Vec<Event>>,//Events to be processed at the end of a cycle (mostly decisions on where to send flits)
	//offset currently being accessed.
	current: usize,
}

impl EventQueue
{
	///Creates a new EventQueue. `size` should be greater than any possible delay.
	pub fn new (size:usize) -> EventQueue
	{
		EventQueue{
			event_begin_circle: vec![ vec![] ; size ],
			event_end_circle: vec![ vec![] ; size ],
			current:0,
		}
	}
	///Advances the queue by a cycle. This drops the events in the finished cycle.
	pub fn advance(&mut self)
	{
		//Better to drop the old Vec; otherwise their capacity is covering a lot of memory.
		self.event_begin_circle[self.current]=Vec::new();
		self.event_end_circle[self.current]=Vec::new();
		self.current=(self.current+1)%self.event_begin_circle.len();
	}
	///Access to the event in the `ievent` index of the events to be executed at the begin of the cycle.
	pub fn access_begin(&self, ievent:usize) -> Option<&Event>
	{
		let v=&self.event_begin_circle[self.current];
		if ievent<v.len()
		{
			Some(&v[ievent])
		}
		else
		{
			None
		}
	}
	///Access to the event in the `ievent` index of the events to be executed at the end of the cycle.
	pub fn access_end(&self, ievent:usize) -> Option<&Event>
	{
		let v=&self.event_end_circle[self.current];
		if ievent<v.len()
		{
			Some(&v[ievent])
		}
		else
		{
			None
		}
	}
	///Adds an event to the list of events to be executed at the begin of the cycle `current_cycle + delay`.
	pub fn enqueue_begin(&mut self, event:Event, delay: Time)
	{
		let delay : usize = delay.try_into().unwrap();
		if delay>=self.event_begin_circle.len()
		{
			panic!("Delay too long");
		}
		let position=(self.current+delay) % self.event_begin_circle.len();
		self.event_begin_circle[position].push(event);
	}
	///Adds an event to the list of events to be executed at the end of the cycle `current_cycle + delay`.
	pub fn enqueue_end(&mut self, event:Event, delay: Time)
	{
		let delay : usize = delay.try_into().unwrap();
		if delay>=self.event_end_circle.len()
		{
			panic!("Delay too long");
		}
		let position=(self.current+delay) % self.event_end_circle.len();
		self.event_end_circle[position].push(event);
	}
	///Adds an event as it requests.
	pub fn enqueue(&mut self, event_generation:EventGeneration)
	{
		match event_generation.position
		{
			CyclePosition::Begin => self.enqueue_begin(event_generation.event,event_generation.delay),
			CyclePosition::End => self.enqueue_end(event_generation.event,event_generation.delay),
		};
	}
}

/**
 Find the lowest number which is strictly greater than the input `x` and multiple of `divisor`.
**/
pub fn next_multiple(x:Time, divisor:Time) -> Time
{
	x - x.rem_euclid(divisor) + divisor
}

/**
 Find the lowest number which is greater or equal to the input `x` and multiple of `divisor`.
**/
pub fn round_to_multiple(x:Time, divisor: Time) -> Time
{
	if x==0
	{
		0
	}
	else
	{
		next_multiple(x-1,divisor)
	}
}

#[cfg(test)]
mod tests
{
	use super::*;
	#[test]
	fn multiples()
	{
		assert_eq!( next_multiple(10,5) , 15 );
		assert_eq!( next_multiple(2,5) , 5 );
		assert_eq!( round_to_multiple(10,5) , 10 );
		assert_eq!( round_to_multiple(12,5) , 15 );
	}
}
