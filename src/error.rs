
/*!
The `Error` type employed on the recoverable paths of the simulator plus the macros to build it.

Configuration mistakes are mostly fatal and panic during construction. The `Error` type is for
the few places where the caller may want to add context before aborting, such as the routing
queries or the configuration accessors.
*/

use std::fmt::{self,Display,Formatter};

use crate::config::ConfigurationValue;

///The place of the code where the error was detected.
#[derive(Debug,Clone)]
pub struct SourceLocation
{
	pub file: &'static str,
	pub line: u32,
}

impl Display for SourceLocation
{
	fn fmt(&self, formatter:&mut Formatter) -> fmt::Result
	{
		write!(formatter,"{}:{}",self.file,self.line)
	}
}

///Capture the current file and line into a `SourceLocation`.
#[macro_export]
macro_rules! source_location{
	() => {{
		$crate::error::SourceLocation{ file: file!(), line: line!() }
	}};
}

///Build an `Error` of the given kind at the current source location.
///`error!(ill_formed_configuration, cv)` expands into
///`Error::new_ill_formed_configuration(source_location!(), cv)`.
#[macro_export]
macro_rules! error{
	($kind:ident) => {{
		$crate::error::Error::$kind( $crate::source_location!() )
	}};
	($kind:ident, $($args:expr),* ) => {{
		$crate::error::Error::$kind( $crate::source_location!(), $($args),* )
	}};
}

#[derive(Debug,Clone)]
pub enum ErrorKind
{
	///A `ConfigurationValue` does not fit the expected schema.
	IllFormedConfiguration(ConfigurationValue),
	///An operation cannot proceed. The message should explain it.
	Undetermined,
}

#[derive(Debug,Clone)]
pub struct Error
{
	pub source_location: SourceLocation,
	pub kind: ErrorKind,
	pub message: Option<String>,
}

impl Error
{
	pub fn ill_formed_configuration(source_location:SourceLocation, cv:ConfigurationValue) -> Error
	{
		Error{
			source_location,
			kind: ErrorKind::IllFormedConfiguration(cv),
			message: None,
		}
	}
	pub fn undetermined(source_location:SourceLocation) -> Error
	{
		Error{
			source_location,
			kind: ErrorKind::Undetermined,
			message: None,
		}
	}
	///Attach an explanation to the error.
	pub fn with_message(mut self, message:String) -> Error
	{
		self.message = Some(message);
		self
	}
}

impl Display for Error
{
	fn fmt(&self, formatter:&mut Formatter) -> fmt::Result
	{
		match self.kind
		{
			ErrorKind::IllFormedConfiguration(ref cv) => write!(formatter,"Ill-formed configuration ({})",cv)?,
			ErrorKind::Undetermined => write!(formatter,"Undetermined error")?,
		};
		if let Some(ref message) = self.message
		{
			write!(formatter,": {}",message)?;
		}
		write!(formatter," at {}",self.source_location)
	}
}
