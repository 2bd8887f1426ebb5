//! Quote-aware string splitting, `$(NAME)` macro substitution, and the
//! low-level tokenizer for the expression engine.

pub mod lexer;
pub mod pcd_tracker;
pub mod splitter;
pub mod substitute;
pub mod token;

pub use lexer::Lexer;
pub use pcd_tracker::PcdTracker;
pub use splitter::{split, Span};
pub use substitute::{default_in_exceptions, substitute};
pub use token::RawToken;
