mod list;
mod parse;
mod run;

pub use list::list;
pub use parse::parse;
pub use run::run;
