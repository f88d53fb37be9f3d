
/*!
The configuration tree consumed by the component builders.

This core does not parse configuration files; whichever frontend drives it builds
`ConfigurationValue` trees and hands them to `Simulation::new` or to the individual
component factories (`new_router`, `new_allocator`, `new_arbiter`, ...). An `Object` is
written `Name { key1: value1, key2: value2, }`, an `Array` is `[value1, value2,]` and
experiment lists (`![...]`) are kept in the tree so that experiment-launching frontends
can share the type.
*/

use std::fmt::{self,Display,Formatter};

use crate::error::Error;
use crate::error;
use crate::event::Time;

#[derive(Debug,Clone,PartialEq)]
pub enum ConfigurationValue
{
	Literal(String),
	Number(f64),
	Object(String,Vec<(String,ConfigurationValue)>),
	Array(Vec<ConfigurationValue>),
	Experiments(Vec<ConfigurationValue>),
	NamedExperiments(String,Vec<ConfigurationValue>),
	True,
	False,
	None,
}

impl Default for ConfigurationValue
{
	fn default() -> ConfigurationValue
	{
		ConfigurationValue::None
	}
}

impl Display for ConfigurationValue
{
	fn fmt(&self, formatter:&mut Formatter) -> fmt::Result
	{
		match self
		{
			&ConfigurationValue::Literal(ref s) => write!(formatter,"\"{}\"",s),
			&ConfigurationValue::Number(v) => write!(formatter,"{}",v),
			&ConfigurationValue::Object(ref name, ref pairs) =>
			{
				write!(formatter,"{}{{",name)?;
				for (key,value) in pairs.iter()
				{
					write!(formatter,"{}:{},",key,value)?;
				}
				write!(formatter,"}}")
			},
			&ConfigurationValue::Array(ref list) =>
			{
				write!(formatter,"[")?;
				for value in list.iter()
				{
					write!(formatter,"{},",value)?;
				}
				write!(formatter,"]")
			},
			&ConfigurationValue::Experiments(ref list) =>
			{
				write!(formatter,"![")?;
				for value in list.iter()
				{
					write!(formatter,"{},",value)?;
				}
				write!(formatter,"]")
			},
			&ConfigurationValue::NamedExperiments(ref name, ref list) =>
			{
				write!(formatter,"{}![",name)?;
				for value in list.iter()
				{
					write!(formatter,"{},",value)?;
				}
				write!(formatter,"]")
			},
			&ConfigurationValue::True => write!(formatter,"true"),
			&ConfigurationValue::False => write!(formatter,"false"),
			&ConfigurationValue::None => write!(formatter,"none"),
		}
	}
}

impl ConfigurationValue
{
	pub fn as_bool(&self) -> Result<bool,Error>
	{
		match self
		{
			&ConfigurationValue::True => Ok(true),
			&ConfigurationValue::False => Ok(false),
			_ => Err(error!(ill_formed_configuration, self.clone() )),
		}
	}
	pub fn as_str(&self) -> Result<&str,Error>
	{
		match self
		{
			&ConfigurationValue::Literal(ref s) => Ok(s),
			_ => Err(error!(ill_formed_configuration, self.clone() )),
		}
	}
	pub fn as_f64(&self) -> Result<f64,Error>
	{
		match self
		{
			&ConfigurationValue::Number(x) => Ok(x),
			_ => Err(error!(ill_formed_configuration, self.clone() )),
		}
	}
	pub fn as_usize(&self) -> Result<usize,Error>
	{
		match self
		{
			&ConfigurationValue::Number(x) =>
			{
				let res = x as usize;
				//Casting from a float to an integer rounds towards zero. Complain when the
				//value was not close to an integer to begin with.
				let y = res as f64;
				let tolerance = 1e-5;
				if x-y > tolerance || x-y < -tolerance
				{
					Err(error!(ill_formed_configuration, self.clone() ))
				}
				else
				{
					Ok( res )
				}
			},
			_ => Err(error!(ill_formed_configuration, self.clone() )),
		}
	}
	pub fn as_time(&self) -> Result<Time,Error>
	{
		self.as_usize().map(|x|x as Time)
	}
	pub fn as_array(&self) -> Result<&Vec<ConfigurationValue>,Error>
	{
		match self
		{
			&ConfigurationValue::Array(ref list) => Ok(list),
			_ => Err(error!(ill_formed_configuration, self.clone() )),
		}
	}
	///Change the name of an `Object`. Used to resolve aliases in the factories.
	pub fn rename(&mut self, new_name:String)
	{
		match self
		{
			&mut ConfigurationValue::Object(ref mut name, ref _pairs) => *name = new_name,
			_ => panic!("Trying to rename a non-Object"),
		}
	}
}

/// match arms against the keys of an object
/// first argument, `$cv:expr`, is the ConfigurationValue expected to be the object
/// second argument, `$name:literal`, is the name the Object should have.
/// third argument, `$valueid:ident`, is the variable name capturing the value in the object's elements
///    and can be used in the arms
/// the remaining arguments are the arms of the match.
#[macro_export]
macro_rules! match_object{
	($cv:expr, $name:literal, $valueid:ident, $($arm:tt)* ) => {{
		match_object!($cv,[$name],$valueid,$($arm)*)
	}};
	($cv:expr, $names:expr, $valueid:ident, $($arm:tt)* ) => {{
		if let &ConfigurationValue::Object(ref cv_name, ref cv_pairs) = $cv
		{
			if !$names.iter().any(|&x|x==cv_name)
			{
				if $names.len()==1 {
					panic!("A {} must be created from a `{}` object not `{}`",$names[0],$names[0],cv_name);
				} else {
					panic!("Trying to create either of `{:?}` object from `{}`",$names,cv_name);
				}
			}
			for &(ref name,ref $valueid) in cv_pairs
			{
				match AsRef::<str>::as_ref(&name)
				{
					$( $arm )*
					"legend_name" => (),
					_ => return Err($crate::error!(ill_formed_configuration,$cv.clone()).with_message(format!("Nothing to do with field {} in {}",name,$names.get(0).unwrap_or_else(||&"None")))),
				}
			}
		}
		else
		{
			return Err($crate::error!(ill_formed_configuration,$cv.clone()).with_message(format!("Trying to create a {} from a non-Object",$names.get(0).unwrap_or_else(||&"None"))));
		}
	}};
}

///Like `match_object!` but panicking on errors.
#[macro_export]
macro_rules! match_object_panic{
	($cv:expr, $name:literal, $valueid:ident ) => {{
		match_object_panic!($cv,[$name],$valueid,)
	}};
	($cv:expr, $name:literal, $valueid:ident, $($arm:tt)* ) => {{
		match_object_panic!($cv,[$name],$valueid,$($arm)*)
	}};
	($cv:expr, $names:expr, $valueid:ident, $($arm:tt)* ) => {{
		if let &ConfigurationValue::Object(ref cv_name, ref cv_pairs) = $cv
		{
			if !$names.iter().any(|&x|x==cv_name)
			{
				if $names.len()==1 {
					panic!("A {} must be created from a `{}` object not `{}`",$names[0],$names[0],cv_name);
				} else {
					panic!("Trying to create either of `{:?}` object from `{}`",$names,cv_name);
				}
			}
			for &(ref name,ref $valueid) in cv_pairs
			{
				match AsRef::<str>::as_ref(&name)
				{
					$( $arm )*
					"legend_name" => (),
					_ => panic!("Nothing to do with field {} in {}",name,$names[0]),
				}
			}
		}
		else
		{
			panic!("Trying to create a {} from a non-Object",$names[0]);
		}
	}};
}

#[cfg(test)]
mod tests
{
	use super::*;
	#[test]
	fn accessors()
	{
		assert_eq!( ConfigurationValue::Number(3.0).as_usize().unwrap(), 3 );
		assert!( ConfigurationValue::Number(3.5).as_usize().is_err() );
		assert_eq!( ConfigurationValue::True.as_bool().unwrap(), true );
		assert!( ConfigurationValue::Literal("x".to_string()).as_f64().is_err() );
	}
	#[test]
	fn object_matching()
	{
		let cv = ConfigurationValue::Object("Thing".to_string(),vec![
			("alpha".to_string(),ConfigurationValue::Number(1.0)),
			("beta".to_string(),ConfigurationValue::True),
		]);
		let mut alpha=None;
		let mut beta=None;
		match_object_panic!(&cv,"Thing",value,
			"alpha" => alpha=Some(value.as_usize().expect("bad value for alpha")),
			"beta" => beta=Some(value.as_bool().expect("bad value for beta")),
		);
		assert_eq!( alpha, Some(1) );
		assert_eq!( beta, Some(true) );
	}
}
