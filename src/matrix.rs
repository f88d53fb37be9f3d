
use std::mem::{size_of};
use crate::quantify::Quantifiable;

///A simple dense matrix. Used for the request, metadata, and grant grids of the allocators,
///with rows indexing clients and columns indexing resources.
#[derive(Debug)]
pub struct Matrix<T>
{
	data: Vec<T>,
	num_columns: usize,
}

impl<T> Matrix<T>
{
	///Read a matrix entry.
	pub fn get(&self,row:usize,column:usize) -> &T
	{
		&self.data[row*self.num_columns+column]
	}
	///Read/write a matrix entry.
	pub fn get_mut(&mut self,row:usize,column:usize) -> &mut T
	{
		&mut self.data[row*self.num_columns+column]
	}
	///Get the number of rows
	pub fn get_rows(&self) -> usize
	{
		self.data.len()/self.num_columns
	}
	///Get the number of columns
	pub fn get_columns(&self) -> usize
	{
		self.num_columns
	}
	///A whole row as a slice. This is what the per-client arbiters receive.
	pub fn row(&self,row:usize) -> &[T]
	{
		&self.data[row*self.num_columns..(row+1)*self.num_columns]
	}
	///Build a matrix with constant values.
	pub fn constant(value:T,num_rows:usize,num_columns:usize) -> Matrix<T> where T:Clone
	{
		Matrix{
			data: vec![value;num_rows*num_columns],
			num_columns,
		}
	}
	///Overwrite every entry. The allocators use it to reset their grids each cycle.
	pub fn fill(&mut self,value:T) where T:Clone
	{
		for entry in self.data.iter_mut()
		{
			*entry = value.clone();
		}
	}
	///Copy a column into the given buffer. This is what the per-resource arbiters receive.
	pub fn copy_column_into(&self,column:usize,buffer:&mut Vec<T>) where T:Clone
	{
		buffer.clear();
		for row in 0..self.get_rows()
		{
			buffer.push(self.get(row,column).clone());
		}
	}
	pub fn map<U,F:FnMut(&T)->U>(&self, f:F) -> Matrix<U>
	{
		Matrix{
			data: self.data.iter().map(f).collect(),
			num_columns: self.num_columns,
		}
	}
}

impl<T:Quantifiable> Quantifiable for Matrix<T>
{
	fn total_memory(&self) -> usize
	{
		size_of::<Matrix<T>>() + self.data.total_memory()
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

impl<T> IntoIterator for Matrix<T>
{
	type Item = T;
	type IntoIter = <Vec<T> as IntoIterator>::IntoIter;
	fn into_iter(self) -> <Self as IntoIterator>::IntoIter
	{
		self.data.into_iter()
	}
}

#[cfg(test)]
mod tests
{
	use super::*;
	#[test]
	fn rows_and_columns()
	{
		let mut m = Matrix::constant(false,3,4);
		*m.get_mut(1,2) = true;
		assert_eq!( m.row(1), &[false,false,true,false] );
		let mut column = Vec::with_capacity(3);
		m.copy_column_into(2,&mut column);
		assert_eq!( column, vec![false,true,false] );
		m.fill(false);
		assert!( m.row(1).iter().all(|&x|!x) );
	}
}
