
/*!
Helpers to estimate the memory being employed by the simulation.

The `Quantifiable` trait can be implemented manually or with the derive macro from the `quantifiable-derive` crate.
*/

use std::mem::size_of;
use std::rc::Rc;
use std::cell::RefCell;
use std::collections::{VecDeque,BTreeMap};

///Trait for components and data whose memory can be measured.
pub trait Quantifiable
{
	///Get the total memory currently being employed by the implementing type. Both stack and heap.
	fn total_memory(&self) -> usize;
	///Prints by stdout how much memory is used per component.
	fn print_memory_breakdown(&self);
	///Get an estimation on how much memory the type could reach during the simulation.
	fn forecast_total_memory(&self) -> usize;
}

macro_rules! trivially_quantifiable{
	($($t:ty),*) => {
		$(
			impl Quantifiable for $t
			{
				fn total_memory(&self) -> usize
				{
					size_of::<$t>()
				}
				fn print_memory_breakdown(&self)
				{
					println!("{} : {}",stringify!($t),size_of::<$t>());
				}
				fn forecast_total_memory(&self) -> usize
				{
					size_of::<$t>()
				}
			}
		)*
	};
}

trivially_quantifiable!(bool,u8,u16,u32,u64,usize,i8,i16,i32,i64,isize,f32,f64,char,String);

impl<T:Quantifiable> Quantifiable for Vec<T>
{
	fn total_memory(&self) -> usize
	{
		//We add the space of the unused capacity as if it were fully used.
		size_of::<Vec<T>>() + self.iter().map(|e|e.total_memory()).sum::<usize>() + (self.capacity()-self.len())*size_of::<T>()
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

impl<T:Quantifiable> Quantifiable for VecDeque<T>
{
	fn total_memory(&self) -> usize
	{
		size_of::<VecDeque<T>>() + self.iter().map(|e|e.total_memory()).sum::<usize>() + (self.capacity()-self.len())*size_of::<T>()
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

impl<T:Quantifiable> Quantifiable for Option<T>
{
	fn total_memory(&self) -> usize
	{
		match self
		{
			&Some(ref value) => size_of::<Option<T>>() - size_of::<T>() + value.total_memory(),
			&None => size_of::<Option<T>>(),
		}
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

impl<T:Quantifiable> Quantifiable for RefCell<T>
{
	fn total_memory(&self) -> usize
	{
		size_of::<RefCell<T>>() - size_of::<T>() + self.borrow().total_memory()
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

///The pointed data is shared, so it is only accounted by whoever claims ownership.
impl<T:?Sized> Quantifiable for Rc<T>
{
	fn total_memory(&self) -> usize
	{
		size_of::<Rc<T>>()
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

impl<K:Quantifiable,V:Quantifiable> Quantifiable for BTreeMap<K,V>
{
	fn total_memory(&self) -> usize
	{
		size_of::<BTreeMap<K,V>>() + self.iter().map(|(k,v)|k.total_memory()+v.total_memory()).sum::<usize>()
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

impl<A:Quantifiable,B:Quantifiable> Quantifiable for (A,B)
{
	fn total_memory(&self) -> usize
	{
		size_of::<(A,B)>() - size_of::<A>() - size_of::<B>() + self.0.total_memory() + self.1.total_memory()
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

impl<T:Quantifiable+?Sized> Quantifiable for Box<T>
{
	fn total_memory(&self) -> usize
	{
		size_of::<Box<T>>() + self.as_ref().total_memory()
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
