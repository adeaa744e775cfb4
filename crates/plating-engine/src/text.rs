//! Fixed lines the orchestrator writes into the transcript.

pub const GREETING: &str = "Hi! I'm your recipe visualizer. Describe a dish or cocktail you'd like to see and I'll bring it to life with a picture. If anything is missing, I'll ask.";
pub const INIT_FAILURE_PREFIX: &str = "Error: the AI model could not be started: ";
pub const CHAT_FAILURE_PREFIX: &str = "Error while talking to the AI model: ";
pub const PLACEHOLDER: &str = "...";
pub const GENERATING: &str = "Great, I have all the details. Generating your picture... 🎨";
pub const IMAGE_READY: &str = "Here's the visualization of your recipe!";
pub const IMAGE_FAILURE_PREFIX: &str = "Error while generating the image: ";
