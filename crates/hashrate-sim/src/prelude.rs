/*!
Re-export of common values and datatypes

Must be imported manually.

```
use hashrate_sim::prelude::*;
```
*/

use crate::{
    agent, config, controller, dashboard, event, simulator, sink, tally,
    threshold,
};

pub use agent::{Agent, AgentError};

pub use config::{AgentConfig, ConfigError, ControllerConfig, HashrateSplit};

pub use controller::{
    AgentCommand, Controller, ControllerError, Phase, Update, START_TOKEN,
};

pub use dashboard::{Dashboard, MAX_BAR_WIDTH};

pub use event::{AgentLine, DecodeError, Event, Statistics};

pub use simulator::{
    RunSummary, Simulator, SimulatorError, StopSignal, STATISTICS_INTERVAL,
};

pub use sink::{EventSink, JsonLines};

pub use tally::{SourceTally, Tally};

pub use threshold::{HashThreshold, ThresholdParseError};
