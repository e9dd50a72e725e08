//! Mock collaborators for engine tests

use std::sync::{Arc, Mutex};

use ct_common::{ChartYaml, Configuration, Maintainer};
use ct_tools::{
    MockAccountValidator, MockChartUtils, MockDirectoryLister, MockGit, MockHelm, MockKubectl,
    MockLinter,
};

use crate::testing::{Testing, Tools};

/// One mock per collaborator; set expectations, then call [`MockTools::into_testing`].
#[derive(Default)]
pub struct MockTools {
    pub git: MockGit,
    pub helm: MockHelm,
    pub kubectl: MockKubectl,
    pub linter: MockLinter,
    pub account_validator: MockAccountValidator,
    pub chart_utils: MockChartUtils,
    pub directory_lister: MockDirectoryLister,
}

impl MockTools {
    pub fn new() -> Self {
        Self::default()
    }

    /// Teardown calls succeed and find no pods.
    pub fn expect_best_effort_cleanup(&mut self) {
        self.kubectl
            .expect_get_pods()
            .returning(|_, _| Ok(Vec::new()));
        self.helm.expect_delete_release().returning(|_, _| ());
        self.kubectl.expect_delete_namespace().returning(|_| ());
    }

    pub fn into_testing(self, config: Configuration) -> Testing {
        Testing::with_tools(
            config,
            Tools {
                git: Arc::new(self.git),
                helm: Arc::new(self.helm),
                kubectl: Arc::new(self.kubectl),
                linter: Arc::new(self.linter),
                account_validator: Arc::new(self.account_validator),
                chart_utils: Arc::new(self.chart_utils),
                directory_lister: Arc::new(self.directory_lister),
            },
        )
    }
}

/// Records collaborator calls for order assertions.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, call: impl Into<String>) {
        self.0
            .lock()
            .expect("mutex should not be poisoned")
            .push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().expect("mutex should not be poisoned").clone()
    }
}

/// A maintained chart manifest at `version`.
pub fn chart_yaml(version: &str) -> ChartYaml {
    ChartYaml {
        name: "foo".to_string(),
        version: version.to_string(),
        deprecated: false,
        maintainers: vec![Maintainer {
            name: "alice".to_string(),
            ..Maintainer::default()
        }],
    }
}
