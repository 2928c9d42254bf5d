use std::sync::Arc;

use crate::base::behavior::ModuleBehaviors;
use crate::timeq::Cycle;

/// Committed state of a clocked component plus the configuration it was built with.
#[derive(Debug)]
pub struct ModuleBase<T, C> {
    pub cycle: Cycle,
    pub state: T,
    pub config: Arc<C>,
}

impl<T: Default, C> ModuleBase<T, C> {
    pub fn new(config: Arc<C>) -> Self {
        Self {
            cycle: 0,
            state: T::default(),
            config,
        }
    }
}

impl<T, C> ModuleBase<T, C> {
    pub fn with_state(state: T, config: Arc<C>) -> Self {
        Self {
            cycle: 0,
            state,
            config,
        }
    }

    /// Advance the local cycle counter at the end of a tick.
    pub fn advance(&mut self) {
        self.cycle = self.cycle.saturating_add(1);
    }
}

pub trait IsModule: ModuleBehaviors {
    type StateType;
    type ConfigType;

    fn base(&mut self) -> &mut ModuleBase<Self::StateType, Self::ConfigType>;

    fn base_ref(&self) -> &ModuleBase<Self::StateType, Self::ConfigType>;

    fn state_mut(&mut self) -> &mut Self::StateType {
        &mut self.base().state
    }

    fn state(&self) -> &Self::StateType {
        &self.base_ref().state
    }

    fn conf(&self) -> &Self::ConfigType {
        &self.base_ref().config
    }

    fn now(&self) -> Cycle {
        self.base_ref().cycle
    }
}

macro_rules! module_inner {
    ($T:ty, $C:ty) => {
        type StateType = $T;
        type ConfigType = $C;

        fn base(&mut self) -> &mut ModuleBase<$T, $C> {
            &mut self.base
        }

        fn base_ref(&self) -> &ModuleBase<$T, $C> {
            &self.base
        }
    };
}

pub(crate) use module_inner;

/// arguments: identifier, state type, config type, additional methods
macro_rules! module {
    ($comp:ident, $T:ty, $C:ty, $($method:item)*) => {
        impl IsModule for $comp {
            type StateType = $T;
            type ConfigType = $C;

            fn base(&mut self) -> &mut ModuleBase<$T, $C> {
                &mut self.base
            }

            fn base_ref(&self) -> &ModuleBase<$T, $C> {
                &self.base
            }

            $($method)*
        }
    };
}

pub(crate) use module;
