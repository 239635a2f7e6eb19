mod common;
mod rewards;
mod routing;
