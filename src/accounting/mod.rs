pub mod performance;
pub mod time_accountant;

pub use performance::{
    BreakOverrun, DailySummary, PerformanceAggregator, PerformanceMetrics, Period,
    PeriodStatistics, RankedEmployee, SpanTotals,
};
