pub mod resource_usage;
