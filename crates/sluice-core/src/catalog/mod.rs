//! Consumer catalog: the records, manager ports and request builders of the
//! consumer endpoints.

pub mod calls;
pub mod entities;
pub mod managers;
pub mod requests;
pub mod tags;

pub use entities::{Binding, Consumer, ConsumerDelta, ContentAction, ContentUnit, Profile};
pub use managers::{AgentManager, BindManager, ConsumerManager, ProfileManager};
pub use requests::{ConsumerRequests, Managers};
pub use tags::{action_tag, resource_tag};
