use alloy::sol;

sol! {
    /// Per-chain connector hosting visiting frogs on a target chain
    #[sol(rpc)]
    interface IFrogConnector {
        event FrogArrived(uint256 indexed tokenId, address indexed owner, string name, bytes32 messageId, uint256 timestamp);

        event FrogReturned(uint256 indexed tokenId, bytes32 messageId, uint256 xpEarned, uint256 timestamp);

        event RandomExploration(uint256 indexed tokenId, address indexed exploredAddress, bool isContract, uint256 codeSize, string observation, uint256 timestamp);

        function randomExplore(uint256 tokenId, string calldata observation) external;

        function shouldReturn(uint256 tokenId) external view returns (bool should, string memory reason);

        function autoReturnFrog(uint256 tokenId) external;
    }
}
