mod aggregator;

pub use aggregator::ResultAggregator;
