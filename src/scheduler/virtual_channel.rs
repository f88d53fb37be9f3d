
use ::rand::rngs::StdRng;

use crate::Plugs;
use crate::allocator::{Allocator,Request,AllocatorBuilderArgument,new_allocator};
use crate::config::ConfigurationValue;
use crate::match_object_panic;

///The verdict for one requesting client after a scheduling cycle.
///`vc_index` is None when no virtual channel could be awarded; the client must re-request.
pub struct VcResponse
{
	pub client: usize,
	pub vc_index: Option<usize>,
}

///Arguments to build a `VcScheduler`.
#[non_exhaustive]
pub struct VcSchedulerBuilderArgument<'a>
{
	///A `VcScheduler{...}` object carrying the allocator.
	pub cv: &'a ConfigurationValue,
	///Name used on fatal diagnostics.
	pub name: String,
	pub num_clients: usize,
	pub total_vcs: usize,
	pub plugs: &'a Plugs,
	pub rng: &'a mut StdRng,
}

/**
Awards downstream virtual channels to head flits. Clients request any number of candidate
virtual channels during a cycle; the owning router resolves all of them with one
[execute_cycle](#method.execute_cycle) call on its next cycle and forwards each
`VcResponse` back, exactly one per requesting client. An awarded virtual channel stays
taken, never offered to another client, until its holder calls
[release_vc](#method.release_vc), which the input pipelines do on the tail flit. A denied
client is not retried automatically.

```ignore
VcScheduler{
	allocator: RSeparable{ slip_latch:true, resource_arbiter:Comparing{greater:false} },
}
```
**/
pub struct VcScheduler
{
	name: String,
	num_clients: usize,
	total_vcs: usize,
	///Requested (virtual channel, metadata) pairs per client, cleared each cycle.
	client_requests: Vec<Vec<(usize,u64)>>,
	///Which virtual channels are currently held by some client.
	vc_taken: Vec<bool>,
	allocator: Box<dyn Allocator>,
}

impl VcScheduler
{
	pub fn new(arg:VcSchedulerBuilderArgument) -> VcScheduler
	{
		let mut allocator_cv = None;
		match_object_panic!(arg.cv,"VcScheduler",value,
			"allocator" => allocator_cv = Some(value.clone()),
		);
		let allocator_cv = allocator_cv.expect("There were no allocator");
		if arg.num_clients==0 || arg.total_vcs==0
		{
			panic!("{}: clients and virtual channels must be nonzero",arg.name);
		}
		let allocator = new_allocator(AllocatorBuilderArgument{
			cv:&allocator_cv,
			num_clients:arg.num_clients,
			num_resources:arg.total_vcs,
			plugs:arg.plugs,
			rng:arg.rng,
		});
		VcScheduler{
			name: arg.name,
			num_clients: arg.num_clients,
			total_vcs: arg.total_vcs,
			client_requests: (0..arg.num_clients).map(|_|vec![]).collect(),
			vc_taken: vec![false;arg.total_vcs],
			allocator,
		}
	}
	pub fn num_clients(&self) -> usize
	{
		self.num_clients
	}
	pub fn total_vcs(&self) -> usize
	{
		self.total_vcs
	}
	///Request the virtual channel `vc_index` for `client`, with the metadata the allocator's
	///arbiters may compare. A client may request several candidate channels in one cycle.
	pub fn request(&mut self, client:usize, vc_index:usize, metadata:u64)
	{
		if client>=self.num_clients || vc_index>=self.total_vcs
		{
			panic!("{}: out of range request client={} vc={}",self.name,client,vc_index);
		}
		self.client_requests[client].push((vc_index,metadata));
	}
	///Whether the virtual channel is currently held by some client.
	pub fn is_taken(&self, vc_index:usize) -> bool
	{
		self.vc_taken[vc_index]
	}
	///Whether some client has requests awaiting the next `execute_cycle`.
	pub fn has_requests(&self) -> bool
	{
		self.client_requests.iter().any(|requests|!requests.is_empty())
	}
	///Release a virtual channel awarded in some earlier cycle.
	pub fn release_vc(&mut self, vc_index:usize)
	{
		if vc_index>=self.total_vcs
		{
			panic!("{}: releasing virtual channel {} of {}",self.name,vc_index,self.total_vcs);
		}
		if !self.vc_taken[vc_index]
		{
			panic!("{}: releasing virtual channel {} which is not taken",self.name,vc_index);
		}
		self.vc_taken[vc_index] = false;
	}
	///Resolve the pending requests. To be called once per cycle by the owning router, which
	///dispatches the responses.
	pub fn execute_cycle(&mut self, rng:&mut StdRng) -> Vec<VcResponse>
	{
		if self.client_requests.iter().all(|requests|requests.is_empty())
		{
			return vec![];
		}
		//mask out the virtual channels already held
		for client in 0..self.num_clients
		{
			for &(vc_index,metadata) in self.client_requests[client].iter()
			{
				if !self.vc_taken[vc_index]
				{
					self.allocator.add_request(Request::new(client,vc_index,Some(metadata)));
				}
			}
		}
		let mut granted : Vec<Option<usize>> = vec![None;self.num_clients];
		for grant in self.allocator.perform_allocation(rng)
		{
			if self.client_requests[grant.client].is_empty()
			{
				panic!("{}: the allocator granted client {} which was not requesting",self.name,grant.client);
			}
			if granted[grant.client].is_some()
			{
				panic!("{}: the allocator granted client {} twice",self.name,grant.client);
			}
			if self.vc_taken[grant.resource]
			{
				panic!("{}: virtual channel {} granted while already held",self.name,grant.resource);
			}
			self.vc_taken[grant.resource] = true;
			granted[grant.client] = Some(grant.resource);
		}
		let mut responses = Vec::new();
		for client in 0..self.num_clients
		{
			if !self.client_requests[client].is_empty()
			{
				self.client_requests[client].clear();
				responses.push(VcResponse{
					client,
					vc_index: granted[client],
				});
			}
		}
		responses
	}
}

#[cfg(test)]
mod tests
{
	use super::*;
	use ::rand::SeedableRng;
	use ::rand::rngs::StdRng;

	fn build(num_clients:usize, total_vcs:usize, rng:&mut StdRng) -> VcScheduler
	{
		let plugs = Plugs::default();
		let cv = ConfigurationValue::Object("VcScheduler".to_string(),vec![
			("allocator".to_string(), ConfigurationValue::Object("RcSeparable".to_string(),vec![
				("iterations".to_string(),ConfigurationValue::Number(1.0)),
				("slip_latch".to_string(),ConfigurationValue::True),
				("resource_arbiter".to_string(),ConfigurationValue::Object("Lslp".to_string(),vec![])),
				("client_arbiter".to_string(),ConfigurationValue::Object("Lslp".to_string(),vec![])),
			])),
		]);
		VcScheduler::new(VcSchedulerBuilderArgument{
			cv:&cv,
			name:"TestVcScheduler".to_string(),
			num_clients,
			total_vcs,
			plugs:&plugs,
			rng,
		})
	}

	#[test]
	fn no_vc_held_twice()
	{
		let mut rng = StdRng::seed_from_u64(300u64);
		let mut scheduler = build(4,2,&mut rng);
		//four clients fight for two virtual channels, cycle after cycle
		let mut held : Vec<Option<usize>> = vec![None;2];
		for _ in 0..50
		{
			for client in 0..4
			{
				scheduler.request(client,0,0);
				scheduler.request(client,1,0);
			}
			let responses = scheduler.execute_cycle(&mut rng);
			assert_eq!(responses.len(),4,"every requesting client hears back exactly once");
			for response in responses.iter()
			{
				if let Some(vc) = response.vc_index
				{
					assert!(held[vc].is_none(),"virtual channel {} granted to two clients",vc);
					held[vc] = Some(response.client);
				}
			}
			//holders release at once, for the next round
			for vc in 0..2
			{
				if held[vc].take().is_some()
				{
					scheduler.release_vc(vc);
				}
			}
		}
	}

	#[test]
	fn taken_vc_is_not_offered()
	{
		let mut rng = StdRng::seed_from_u64(301u64);
		let mut scheduler = build(2,1,&mut rng);
		scheduler.request(0,0,0);
		let responses = scheduler.execute_cycle(&mut rng);
		assert_eq!(responses[0].vc_index,Some(0));
		//the channel is held, the second client must be denied until release
		scheduler.request(1,0,0);
		let responses = scheduler.execute_cycle(&mut rng);
		assert_eq!(responses[0].vc_index,None);
		scheduler.release_vc(0);
		scheduler.request(1,0,0);
		let responses = scheduler.execute_cycle(&mut rng);
		assert_eq!(responses[0].vc_index,Some(0));
	}

	#[test]
	#[should_panic(expected="not taken")]
	fn releasing_free_vc_is_fatal()
	{
		let mut rng = StdRng::seed_from_u64(302u64);
		let mut scheduler = build(2,2,&mut rng);
		scheduler.release_vc(0);
	}

	#[test]
	fn denied_requests_are_not_retried()
	{
		let mut rng = StdRng::seed_from_u64(303u64);
		let mut scheduler = build(2,1,&mut rng);
		scheduler.request(0,0,0);
		scheduler.request(1,0,0);
		let responses = scheduler.execute_cycle(&mut rng);
		assert_eq!(responses.len(),2);
		//one of them got the channel, the loser is forgotten
		let responses = scheduler.execute_cycle(&mut rng);
		assert!(responses.is_empty());
	}
}
