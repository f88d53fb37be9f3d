
/*!
The congestion-status device a router exposes to adaptive routing algorithms.

The device is wired as a [CreditWatcher](../scheduler/trait.CreditWatcher.html) of the
schedulers whose credit pools it should mirror, so it sees every credit movement without
the queues knowing about it. Routing algorithms read a scalar in [0,1] per
(output port, virtual channel) through `Router::congestion_status`.
*/

use std::mem::size_of;

use crate::config::ConfigurationValue;
use crate::quantify::Quantifiable;
use crate::scheduler::CreditWatcher;
use crate::match_object_panic;

///How the occupancy is normalized into [0,1].
#[derive(Clone,Copy,PartialEq,Eq,Debug)]
pub enum CongestionStyle
{
	///Occupied slots over a fixed window. The only valid style over unbounded pools,
	///such as the output queues of a purely output-queued router.
	Absolute,
	///Occupied slots over the pool capacity.
	Relative,
}

///Arguments to build a `CongestionStatus`.
#[non_exhaustive]
pub struct CongestionStatusBuilderArgument<'a>
{
	///A `CongestionStatus{...}` object.
	pub cv: &'a ConfigurationValue,
	///Name used on fatal diagnostics.
	pub name: String,
	///Number of tracked (port, virtual channel) pairs.
	pub total_vcs: usize,
}

/**
Tracks per-virtual-channel occupancy from the credit traffic of the schedulers watching it
and condenses it into a scalar in [0,1].

```ignore
CongestionStatus{
	style: "absolute",
	absolute_window: 16,
}
```
`absolute_window` is only meaningful for the absolute style and bounds the occupancy that
already counts as fully congested.
**/
pub struct CongestionStatus
{
	name: String,
	style: CongestionStyle,
	absolute_window: usize,
	///Occupied slots per virtual channel.
	occupancy: Vec<usize>,
	///Capacity per virtual channel. None for unbounded pools.
	capacity: Vec<Option<usize>>,
}

impl CongestionStatus
{
	pub fn new(arg:CongestionStatusBuilderArgument) -> CongestionStatus
	{
		let mut style = None;
		let mut absolute_window = None;
		match_object_panic!(arg.cv,"CongestionStatus",value,
			"style" => style = Some(match value.as_str().expect("bad value for style")
			{
				"absolute" => CongestionStyle::Absolute,
				"relative" => CongestionStyle::Relative,
				s => panic!("invalid congestion style: {}",s),
			}),
			"absolute_window" => absolute_window = Some(value.as_usize().expect("bad value for absolute_window")),
		);
		let style = style.expect("There were no style");
		let absolute_window = match style
		{
			CongestionStyle::Absolute => absolute_window.expect("There were no absolute_window"),
			CongestionStyle::Relative => absolute_window.unwrap_or(0),
		};
		if style==CongestionStyle::Absolute && absolute_window==0
		{
			panic!("{}: absolute_window must be nonzero",arg.name);
		}
		CongestionStatus{
			name: arg.name,
			style,
			absolute_window,
			occupancy: vec![0;arg.total_vcs],
			capacity: vec![Some(0);arg.total_vcs],
		}
	}
	pub fn style(&self) -> CongestionStyle
	{
		self.style
	}
	///The congestion estimate for a virtual channel, in [0,1].
	pub fn status(&self, vc_index:usize) -> f64
	{
		let occupancy = self.occupancy[vc_index] as f64;
		match self.style
		{
			CongestionStyle::Absolute =>
			{
				let value = occupancy / self.absolute_window as f64;
				if value>1.0 { 1.0 } else { value }
			},
			CongestionStyle::Relative =>
			{
				match self.capacity[vc_index]
				{
					Some(capacity) =>
					{
						if capacity==0
						{
							panic!("{}: relative congestion over a virtual channel {} with no capacity",self.name,vc_index);
						}
						occupancy / capacity as f64
					},
					None => panic!("{}: relative congestion requires bounded pools, virtual channel {} is unbounded",self.name,vc_index),
				}
			},
		}
	}
}

impl CreditWatcher for CongestionStatus
{
	fn init_credits(&mut self, vc:usize, credits:Option<usize>)
	{
		//a device may watch several schedulers over the same index; the pools accumulate
		self.capacity[vc] = match (self.capacity[vc],credits)
		{
			(Some(current),Some(more)) => Some(current+more),
			_ => None,
		};
	}
	fn increment_credit(&mut self, vc:usize)
	{
		if self.occupancy[vc]==0
		{
			panic!("{}: credit increment on virtual channel {} with no occupancy",self.name,vc);
		}
		self.occupancy[vc] -= 1;
	}
	fn decrement_credit(&mut self, vc:usize)
	{
		self.occupancy[vc] += 1;
		if let Some(capacity) = self.capacity[vc]
		{
			if self.occupancy[vc] > capacity
			{
				panic!("{}: occupancy of virtual channel {} raised over its capacity {}",self.name,vc,capacity);
			}
		}
	}
}

impl Quantifiable for CongestionStatus
{
	fn total_memory(&self) -> usize
	{
		size_of::<CongestionStatus>() + self.occupancy.total_memory() + self.capacity.total_memory()
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

#[cfg(test)]
mod tests
{
	use super::*;

	fn build(style:&str, window:usize, total_vcs:usize) -> CongestionStatus
	{
		let mut pairs = vec![ ("style".to_string(),ConfigurationValue::Literal(style.to_string())) ];
		if window>0
		{
			pairs.push(("absolute_window".to_string(),ConfigurationValue::Number(window as f64)));
		}
		let cv = ConfigurationValue::Object("CongestionStatus".to_string(),pairs);
		CongestionStatus::new(CongestionStatusBuilderArgument{
			cv:&cv,
			name:"TestCongestionStatus".to_string(),
			total_vcs,
		})
	}

	#[test]
	fn relative_tracks_occupancy()
	{
		let mut device = build("relative",0,2);
		device.init_credits(0,Some(8));
		device.init_credits(1,Some(8));
		assert_eq!(device.status(0),0.0);
		for _ in 0..4
		{
			device.decrement_credit(0);
		}
		assert_eq!(device.status(0),0.5);
		device.increment_credit(0);
		assert_eq!(device.status(0),3.0/8.0);
		assert_eq!(device.status(1),0.0);
	}

	#[test]
	fn absolute_saturates_at_one()
	{
		let mut device = build("absolute",4,1);
		device.init_credits(0,None);
		for _ in 0..10
		{
			device.decrement_credit(0);
		}
		assert_eq!(device.status(0),1.0);
	}

	#[test]
	#[should_panic(expected="unbounded")]
	fn relative_rejects_unbounded_pools()
	{
		let mut device = build("relative",0,1);
		device.init_credits(0,None);
		device.decrement_credit(0);
		device.status(0);
	}
}
