//! A `std::sync::Mutex` wrapper without poisoning.
//!
//! A panic while a registration table or key attachment is locked must not
//! turn every later `poll` or `register` into a panic as well.

use std::ops::{Deref, DerefMut};
use std::sync as std_sync;

pub(crate) struct Mutex<T: ?Sized> {
	inner: std_sync::Mutex<T>,
}

impl<T> Mutex<T> {
	#[inline]
	pub(crate) const fn new(value: T) -> Self {
		Self { inner: std_sync::Mutex::new(value) }
	}
}

impl<T: ?Sized> Mutex<T> {
	/// Never fails; a poisoned lock is recovered.
	#[inline]
	pub(crate) fn lock(&self) -> MutexGuard<'_, T> {
		MutexGuard { inner: self.inner.lock().unwrap_or_else(|e| e.into_inner()) }
	}
}

pub(crate) struct MutexGuard<'a, T: ?Sized> {
	inner: std_sync::MutexGuard<'a, T>,
}

impl<T: ?Sized> Deref for MutexGuard<'_, T> {
	type Target = T;

	#[inline]
	fn deref(&self) -> &T {
		&self.inner
	}
}

impl<T: ?Sized> DerefMut for MutexGuard<'_, T> {
	#[inline]
	fn deref_mut(&mut self) -> &mut T {
		&mut self.inner
	}
}
