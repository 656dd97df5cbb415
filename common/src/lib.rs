#![allow(clippy::module_inception)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::upper_case_acronyms)]

pub mod account;
pub mod block;
pub mod config;
pub mod contract;
pub mod crypto;
pub mod serializer;
pub mod transaction;
pub mod vm;
