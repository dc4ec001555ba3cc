/// Prompts offered when the user has nothing in mind yet.
pub const EXAMPLE_PROMPTS: [&str; 5] = [
    "A cute robot companion with rounded edges and friendly features",
    "An ancient magical staff with crystals and intricate runes",
    "A futuristic hover bike with sleek aerodynamic design",
    "A mystical floating island with waterfalls and crystal formations",
    "A sci-fi battle mech with detailed armor plating",
];

/// Free preview generations per installation.
pub const MAX_GENERATIONS: u32 = 3;

/// Placeholder credential shipped in sample env files; treated as "not configured".
pub const API_KEY_SENTINEL: &str = "your-api-key";

pub const DEFAULT_VENDOR_URL: &str = "https://api.meshy.ai/openapi/v2/text-to-3d";

pub const RATE_LIMIT_MESSAGE: &str = "Rate limit exceeded. Please try again later.";
