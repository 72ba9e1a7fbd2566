pub mod declaration;
pub mod fact;
pub mod normalize;
pub mod query;
pub mod rulebase;
