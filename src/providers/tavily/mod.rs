pub mod tavily;
