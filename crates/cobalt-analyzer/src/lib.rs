mod error;
mod gradient;
mod lasso;
mod minimizer;
mod rappor;

pub use error::AnalyzerError;
pub use gradient::GradientEvaluator;
pub use lasso::{DebiasedResult, LassoPathResult, LassoRunner};
pub use minimizer::{LossMinimizer, MinimizerConfig};
pub use rappor::{build_candidate_matrix, estimate_bit_counts, CandidateResult, CohortObservation, RapporAnalyzer};
