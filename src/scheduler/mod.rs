/*!

The per-cycle schedulers a router drives: the [CrossbarScheduler](crossbar/struct.CrossbarScheduler.html)
matching queued flits onto crossbar ports under credit flow control, and the
[VcScheduler](virtual_channel/struct.VcScheduler.html) binding head flits to downstream
virtual channels.

Both are owned by their router and invoked from its event processing; requests registered
during one router cycle are resolved by a single allocator invocation on the next one.

*/

pub mod crossbar;
pub mod virtual_channel;

///An observer of the credit counters of a `CrossbarScheduler`. Watchers see every init,
///increment, and decrement, with the virtual channel translated to a global index by the
///scheduler's `global_vc_offset`. The watcher list is populated while building the router
///and must not be mutated once the simulation starts.
pub trait CreditWatcher
{
	///A virtual channel has been given its credit pool. `None` stands for an unbounded pool.
	fn init_credits(&mut self, vc:usize, credits:Option<usize>);
	///A credit has been returned to the virtual channel.
	fn increment_credit(&mut self, vc:usize);
	///A credit of the virtual channel has been consumed.
	fn decrement_credit(&mut self, vc:usize);
}
