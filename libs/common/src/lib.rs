pub mod chains;

pub mod interfaces {
    pub mod frog_connector;
    pub mod omni_travel;
}
