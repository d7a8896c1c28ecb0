mod batch_test;
mod persistence_test;
mod resolver_test;
