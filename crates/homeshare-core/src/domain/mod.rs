//! Domain entities for HomeShare.
//!
//! This module contains pure business logic with no infrastructure dependencies.
//!
//! # What is "domain" in Clean Architecture? (for beginners)
//!
//! Clean Architecture organises code into concentric layers.  The innermost
//! layer is called the **domain**.  Domain code:
//!
//! - Contains the core business rules of the application.
//! - Has **no** imports from network libraries, async runtimes, or the
//!   filesystem.
//! - Can be compiled and tested on any platform without any external setup.
//!
//! Here the domain is small: who is connected ([`device`]), what a transfer
//! is made of ([`transfer`]), and how a transfer can fail ([`failure`]).

/// Connected endpoints and their device kinds.
pub mod device;

/// Why a transfer ended without completing.
pub mod failure;

/// Transfer identifiers, PINs, and chunk arithmetic.
pub mod transfer;
