pub mod closure;
pub mod date_field;
pub mod schedule;
pub mod sg_date_now;
