pub mod mark;
pub mod onsite;
pub mod staff;
