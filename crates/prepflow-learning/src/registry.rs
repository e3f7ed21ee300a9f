//! Named estimator registries per task.
//!
//! Registries hold factories rather than models, so every sweep run (and
//! every rayon worker) trains a fresh instance.

use std::fmt;
use std::sync::Arc;

use crate::config::TaskType;
use crate::error::{LearningError, Result};
use crate::models::boosting::BoostingParams;
use crate::models::{
    DecisionTreeClassifier, DecisionTreeRegressor, ElasticNet, Estimator, ExtraTreesClassifier,
    ExtraTreesRegressor, GaussianNB, GradientBoostingClassifier, GradientBoostingRegressor,
    KNeighborsClassifier, KNeighborsRegressor, Lasso, LinearRegression, LogisticRegression,
    RandomForestClassifier, RandomForestRegressor, Ridge, RidgeClassifier, TreeParams,
};

/// Creates a fresh, unfitted estimator.
pub type ModelFactory = Arc<dyn Fn() -> Box<dyn Estimator> + Send + Sync>;

/// Wrap a closure as a [`ModelFactory`].
pub fn factory<F, E>(make: F) -> ModelFactory
where
    F: Fn() -> E + Send + Sync + 'static,
    E: Estimator + 'static,
{
    Arc::new(move || Box::new(make()) as Box<dyn Estimator>)
}

/// Ordered set of named model factories.
#[derive(Clone, Default)]
pub struct ModelRegistry {
    entries: Vec<(String, ModelFactory)>,
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl ModelRegistry {
    /// Built-in registry for a task.
    ///
    /// # Errors
    ///
    /// [`LearningError::UnsupportedTask`] for clustering.
    pub fn for_task(task: TaskType, seed: u64) -> Result<Self> {
        match task {
            TaskType::Classification => Ok(Self::classification(seed)),
            TaskType::Regression => Ok(Self::regression(seed)),
            other => Err(LearningError::UnsupportedTask(other.to_string())),
        }
    }

    /// Regression models in sweep order.
    pub fn regression(seed: u64) -> Self {
        let tree = TreeParams {
            seed,
            ..TreeParams::default()
        };
        let boost = BoostingParams {
            seed,
            ..BoostingParams::default()
        };

        let mut registry = Self::default();
        registry.register("Gradient Boosting", factory(move || GradientBoostingRegressor::new(boost.clone())));
        registry.register("Extra Trees", factory(move || ExtraTreesRegressor::new(seed)));
        registry.register("Random Forest", factory(move || RandomForestRegressor::new(seed)));
        registry.register("Decision Tree", factory(move || DecisionTreeRegressor::new(tree.clone())));
        registry.register("KNN Regressor", factory(KNeighborsRegressor::default));
        registry.register("Elastic Net", factory(ElasticNet::default));
        registry.register("Lasso", factory(Lasso::default));
        registry.register("Linear Regression", factory(LinearRegression::default));
        registry.register("Ridge Regression", factory(Ridge::default));
        registry
    }

    /// Classification models in sweep order.
    pub fn classification(seed: u64) -> Self {
        let tree = TreeParams {
            seed,
            ..TreeParams::default()
        };
        let boost = BoostingParams {
            seed,
            ..BoostingParams::default()
        };

        let mut registry = Self::default();
        registry.register(
            "Gradient Boosting Classifier",
            factory(move || GradientBoostingClassifier::new(boost.clone())),
        );
        registry.register("Random Forest Classifier", factory(move || RandomForestClassifier::new(seed)));
        registry.register("Extra Trees Classifier", factory(move || ExtraTreesClassifier::new(seed)));
        registry.register("Logistic Regression", factory(LogisticRegression::default));
        registry.register("Naïve Bayes", factory(GaussianNB::default));
        registry.register("Ridge Classifier", factory(RidgeClassifier::default));
        registry.register(
            "Decision Tree Classifier",
            factory(move || DecisionTreeClassifier::new(tree.clone())),
        );
        registry.register("K Neighbors Classifier", factory(KNeighborsClassifier::default));
        registry
    }

    /// Insert or replace a model.
    ///
    /// An existing name keeps its position; a new name is appended.
    pub fn register(&mut self, name: impl Into<String>, make: ModelFactory) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = make,
            None => self.entries.push((name, make)),
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn entries(&self) -> &[(String, ModelFactory)] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_classification_order() {
        let registry = ModelRegistry::classification(42);
        assert_eq!(
            registry.names(),
            vec![
                "Gradient Boosting Classifier",
                "Random Forest Classifier",
                "Extra Trees Classifier",
                "Logistic Regression",
                "Naïve Bayes",
                "Ridge Classifier",
                "Decision Tree Classifier",
                "K Neighbors Classifier",
            ]
        );
    }

    #[test]
    fn test_regression_registry_size() {
        assert_eq!(ModelRegistry::regression(42).len(), 9);
    }

    #[test]
    fn test_register_replaces_in_place() {
        let mut registry = ModelRegistry::regression(42);
        registry.register("Lasso", factory(Ridge::default));
        registry.register("My Model", factory(LinearRegression::default));

        let names = registry.names();
        assert_eq!(names.len(), 10);
        assert_eq!(names[6], "Lasso");
        assert_eq!(names[9], "My Model");
    }

    #[test]
    fn test_clustering_unsupported() {
        let err = ModelRegistry::for_task(TaskType::Clustering, 42).unwrap_err();
        assert!(matches!(err, LearningError::UnsupportedTask(_)));
    }
}
