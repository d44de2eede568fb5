mod callback;
mod charge;
mod helpers;
mod mocks;
mod orders;
